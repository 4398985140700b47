use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Numeric verbosity of a log entry. Smaller is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(pub u32);

impl Level {
    pub const ERROR: Level = Level(10);
    pub const WARN: Level = Level(20);
    pub const INFO: Level = Level(30);
    pub const DEBUG: Level = Level(40);

    /// Name of a standard level, `None` for custom numeric levels.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Level::ERROR => Some("error"),
            Level::WARN => Some("warn"),
            Level::INFO => Some("info"),
            Level::DEBUG => Some("debug"),
            _ => None,
        }
    }
}

impl From<u32> for Level {
    fn from(value: u32) -> Self {
        Level(value)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl std::str::FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Level::ERROR),
            "warn" => Ok(Level::WARN),
            "info" => Ok(Level::INFO),
            "debug" => Ok(Level::DEBUG),
            other => other.parse::<u32>().map(Level).map_err(|_| {
                LogError::Configuration(format!("Unknown verbosity level: {}", s))
            }),
        }
    }
}

/// Default lower bound applied to every offset written into a record.
pub const DEFAULT_CLAMP_FLOOR: f64 = 0.0;

/// Construction options for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    /// Entries with a level above this are dropped. `None` disables filtering.
    pub verbosity: Option<Level>,
    /// Offsets below this value are raised to it.
    pub clamp_floor: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbosity: Some(Level::INFO),
            clamp_floor: DEFAULT_CLAMP_FLOOR,
        }
    }
}

impl Options {
    pub fn unfiltered() -> Self {
        Self {
            verbosity: None,
            ..Self::default()
        }
    }

    pub fn with_verbosity(mut self, level: impl Into<Level>) -> Self {
        self.verbosity = Some(level.into());
        self
    }

    /// Set the verbosity from a level name or a decimal number.
    pub fn with_verbosity_name(self, name: &str) -> Result<Self, LogError> {
        let level: Level = name.parse()?;
        Ok(self.with_verbosity(level))
    }

    pub fn with_clamp_floor(mut self, floor: f64) -> Self {
        self.clamp_floor = floor;
        self
    }

    /// Whether an entry at `level` passes the threshold.
    pub fn allows(&self, level: Level) -> bool {
        match self.verbosity {
            Some(threshold) => level <= threshold,
            None => true,
        }
    }
}
