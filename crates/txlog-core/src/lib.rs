//! # txlog-core
//!
//! Deferred, per-transaction structured logging.
//!
//! A [`LogSession`] gathers every log line, timer, event and data value of one
//! transaction into a single [`MessageRecord`]. Nothing is emitted while the
//! transaction runs: when the last clone of the session is dropped the record
//! is sealed and passed to the session's callback, exactly once.
//!
//! ## Key Types
//!
//! - [`LogSession`] - Shared handle that owns the record and its callback
//! - [`TimerHandle`] - Scoped timer, stopped on drop
//! - [`MessageRecord`] - The sealed record handed to the callback
//! - [`Level`] / [`Options`] - Verbosity filtering and offset clamping
//! - [`Clock`] - Time source (`SystemClock`, `ManualClock`)

mod clock;
mod error;
mod level;
mod record;
mod session;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LogError, NameKind};
pub use level::{Level, Options, DEFAULT_CLAMP_FLOOR};
pub use record::{LogEntry, MessageRecord, TimerSpan};
pub use session::{Callback, DataGuard, LogSession, SessionBuilder};
pub use timer::TimerHandle;
