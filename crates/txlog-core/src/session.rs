use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::LogError;
use crate::level::{Level, Options};
use crate::record::MessageRecord;

/// Receives the sealed record when a session finalizes.
pub type Callback = Box<dyn FnOnce(MessageRecord) + Send + 'static>;

/// Shared state behind every clone of a [`LogSession`].
///
/// Dropping this is the finalization point: it only happens once the last
/// session clone and the last [`TimerHandle`](crate::TimerHandle) are gone.
pub(crate) struct SessionInner {
    start: f64,
    options: Options,
    clock: Arc<dyn Clock>,
    record: Mutex<MessageRecord>,
    /// Kept apart from `record` so a held [`DataGuard`] never blocks logging,
    /// timers or events. Merged into the record at finalization.
    data: Mutex<Map<String, Value>>,
    callback: Mutex<Option<Callback>>,
}

impl SessionInner {
    /// Seconds since `start`, never below the configured clamp floor.
    fn offset(&self) -> f64 {
        let raw = self.clock.now() - self.start;
        if raw < self.options.clamp_floor {
            if raw < 0.0 {
                warn!(offset = raw, "clock stepped behind session start, clamping");
            }
            self.options.clamp_floor
        } else {
            raw
        }
    }

    fn record(&self) -> MutexGuard<'_, MessageRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let end = self.offset();
        let start = self.start;
        let record = self
            .record
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        let data = std::mem::take(self.data.get_mut().unwrap_or_else(PoisonError::into_inner));
        record.data.extend(data);
        let forced = record.seal(end);
        let record = std::mem::replace(record, MessageRecord::new(start));

        debug!(
            end = record.end,
            logs = record.logs.len(),
            timers = record.timers.len(),
            events = record.events.len(),
            force_closed = forced,
            "finalizing log session"
        );

        let callback = self
            .callback
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback(record);
        }
    }
}

/// Accumulates everything one transaction logs into a single record.
///
/// Cloning is cheap and every clone refers to the same record. The record is
/// sealed and handed to the callback exactly once, when the last clone (or
/// timer handle derived from one) is dropped. A leaked clone means the
/// callback never runs.
#[derive(Clone)]
pub struct LogSession {
    pub(crate) inner: Arc<SessionInner>,
}

impl std::fmt::Debug for LogSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSession")
            .field("start", &self.inner.start)
            .field("options", &self.inner.options)
            .field("references", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl LogSession {
    /// Create a session reading the system clock.
    pub fn new<F>(callback: F, options: Options) -> Self
    where
        F: FnOnce(MessageRecord) + Send + 'static,
    {
        Self::with_parts(Box::new(callback), options, Arc::new(SystemClock))
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    fn with_parts(callback: Callback, options: Options, clock: Arc<dyn Clock>) -> Self {
        let start = clock.now();
        debug!(start, verbosity = ?options.verbosity, "opening log session");
        Self {
            inner: Arc::new(SessionInner {
                start,
                options,
                clock,
                record: Mutex::new(MessageRecord::new(start)),
                data: Mutex::new(Map::new()),
                callback: Mutex::new(Some(callback)),
            }),
        }
    }

    /// Absolute clock reading at creation.
    pub fn start(&self) -> f64 {
        self.inner.start
    }

    /// Current offset from `start`, clamped like every recorded offset.
    pub fn elapsed(&self) -> f64 {
        self.inner.offset()
    }

    pub fn verbosity(&self) -> Option<Level> {
        self.inner.options.verbosity
    }

    /// Whether an entry at `level` would be kept.
    pub fn enabled(&self, level: impl Into<Level>) -> bool {
        self.inner.options.allows(level.into())
    }

    pub(crate) fn offset(&self) -> f64 {
        self.inner.offset()
    }

    pub(crate) fn record(&self) -> MutexGuard<'_, MessageRecord> {
        self.inner.record()
    }

    /// Append an entry if `level` passes the verbosity threshold.
    pub fn log<I>(&self, level: impl Into<Level>, items: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let level = level.into();
        if !self.enabled(level) {
            return;
        }
        let offset = self.offset();
        let items = items.into_iter().map(Into::into).collect();
        self.record().push_log(offset, level, items);
    }

    /// Like [`log`](Self::log), but `thunk` only runs when the entry is kept.
    pub fn log_with<F, I>(&self, level: impl Into<Level>, thunk: F)
    where
        F: FnOnce() -> I,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let level = level.into();
        if !self.enabled(level) {
            return;
        }
        let offset = self.offset();
        let items: Vec<Value> = thunk().into_iter().map(Into::into).collect();
        self.record().push_log(offset, level, items);
    }

    pub fn error<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.log(Level::ERROR, items)
    }

    pub fn warn<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.log(Level::WARN, items)
    }

    pub fn info<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.log(Level::INFO, items)
    }

    pub fn debug<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.log(Level::DEBUG, items)
    }

    pub fn debug_with<F, I>(&self, thunk: F)
    where
        F: FnOnce() -> I,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.log_with(Level::DEBUG, thunk)
    }

    /// Mutable access to the record's free-form data bag.
    ///
    /// The guard only locks the bag itself: logging, timers and events stay
    /// usable while it is held. Call [`set`](Self::set) only after the guard
    /// is dropped.
    pub fn data(&self) -> DataGuard<'_> {
        DataGuard {
            data: self.inner.data.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Write a single key into the data bag.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.data().insert(key.into(), value.into());
    }
}

/// Lock guard over a session's data bag.
pub struct DataGuard<'a> {
    data: MutexGuard<'a, Map<String, Value>>,
}

impl Deref for DataGuard<'_> {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for DataGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

/// Step-by-step construction of a [`LogSession`].
#[derive(Default)]
pub struct SessionBuilder {
    options: Options,
    clock: Option<Arc<dyn Clock>>,
    callback: Option<Callback>,
}

impl SessionBuilder {
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Set the threshold from a level name (`error`, `warn`, `info`, `debug`)
    /// or a decimal number.
    pub fn verbosity(mut self, name: &str) -> Result<Self, LogError> {
        self.options = self.options.with_verbosity_name(name)?;
        Ok(self)
    }

    pub fn level(mut self, level: impl Into<Level>) -> Self {
        self.options = self.options.with_verbosity(level);
        self
    }

    pub fn unfiltered(mut self) -> Self {
        self.options.verbosity = None;
        self
    }

    pub fn clamp_floor(mut self, floor: f64) -> Self {
        self.options = self.options.with_clamp_floor(floor);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(MessageRecord) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<LogSession, LogError> {
        let callback = self.callback.ok_or_else(|| {
            LogError::Configuration("a log session needs a completion callback".to_string())
        })?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Ok(LogSession::with_parts(callback, self.options, clock))
    }
}
