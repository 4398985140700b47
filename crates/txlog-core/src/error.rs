use thiserror::Error;

/// Which keyed section of a record a name collided in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Timer,
    Event,
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameKind::Timer => write!(f, "timer"),
            NameKind::Event => write!(f, "event"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: NameKind, name: String },
}

impl LogError {
    pub(crate) fn duplicate(kind: NameKind, name: &str) -> Self {
        Self::DuplicateName {
            kind,
            name: name.to_string(),
        }
    }

    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, Self::DuplicateName { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
