use tracing::{debug, trace};

use crate::error::LogError;
use crate::session::LogSession;

/// An open timer in a session's record.
///
/// Dropping the handle (or calling [`stop`](Self::stop)) writes the end
/// offset. A handle keeps its session alive, so a timer that is still open
/// when the session finalizes can only belong to a leaked handle; those are
/// closed at the session's end time.
#[derive(Debug)]
#[must_use = "dropping a TimerHandle stops the timer immediately"]
pub struct TimerHandle {
    session: LogSession,
    name: String,
    stopped: bool,
}

impl TimerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the timer now.
    pub fn stop(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let offset = self.session.offset();
        if let Some(end) = self.session.record().close_timer(&self.name, offset) {
            trace!(timer = %self.name, end, "timer closed");
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl LogSession {
    /// Open a named timer at the current offset.
    ///
    /// Names are consumed for the lifetime of the record: reusing one fails
    /// even after the earlier timer was stopped.
    pub fn timer(&self, name: impl Into<String>) -> Result<TimerHandle, LogError> {
        let name = name.into();
        let offset = self.offset();
        if let Err(err) = self.record().open_timer(&name, offset) {
            debug!(timer = %name, "rejected duplicate timer name");
            return Err(err);
        }
        trace!(timer = %name, start = offset, "timer opened");
        Ok(TimerHandle {
            session: self.clone(),
            name,
            stopped: false,
        })
    }

    /// Run `f` inside a timer named `name`.
    pub fn timed<T>(&self, name: impl Into<String>, f: impl FnOnce() -> T) -> Result<T, LogError> {
        let _timer = self.timer(name)?;
        Ok(f())
    }

    /// Record a zero-duration marker at the current offset.
    pub fn event(&self, name: impl Into<String>) -> Result<(), LogError> {
        let name = name.into();
        let offset = self.offset();
        if let Err(err) = self.record().record_event(&name, offset) {
            debug!(event = %name, "rejected duplicate event name");
            return Err(err);
        }
        trace!(event = %name, offset, "event recorded");
        Ok(())
    }
}
