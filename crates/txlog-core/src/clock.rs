use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

/// Source of wall-clock time in seconds.
///
/// Readings are not assumed to be monotonic. Sessions clamp every offset
/// they derive, so a clock that steps backwards never produces a negative
/// offset in a record.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        let now = Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9
    }
}

/// Clock whose reading only changes when told to.
///
/// Clones share the same reading, so a test can keep one clone and hand
/// another to a session.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: f64) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move the reading by `secs`, which may be negative to simulate skew.
    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
