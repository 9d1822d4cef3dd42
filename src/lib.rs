//! Double-buffered asynchronous append-only file writer.
//!
//! [`AsyncFile`] accepts short byte-string writes from any number of
//! producer threads without performing synchronous disk I/O on the caller's
//! thread. A single dedicated flusher thread consolidates queued bytes and
//! writes them to the underlying file descriptor, either on a timer, on an
//! oversized write, or on an explicit [`AsyncFile::flush`] call. Log rotation
//! is supported via [`AsyncFile::reopen`], which closes the current
//! descriptor and reopens the configured path without losing buffered bytes.
//!
//! The OS syscall surface, the periodic timer, and the stats sink are all
//! injectable so the flusher can be exercised deterministically in tests;
//! see [`os_calls`], [`dispatcher`], and [`stats`].

mod config;
mod core;
mod dispatcher;
mod error;
mod os_calls;
mod path_utils;
mod rate_limited_warner;
mod stats;

pub use config::{AsyncFileBuilder, AsyncFileConfig};
pub use core::{AsyncFile, SIZE_THRESHOLD};
pub use dispatcher::{Dispatcher, ManualDispatcher, ThreadTimer, TimerCallback};
pub use error::AsyncFileError;
pub use os_calls::{MockOsCalls, OpenResult, OsCalls, OsEvent, UnixOsCalls};
pub use path_utils::{directory_exists, file_exists, read_to_end};
pub use stats::{AtomicCounters, CounterSnapshot, StatsSink};
