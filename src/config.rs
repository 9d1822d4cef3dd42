//! Construction-time configuration for [`crate::AsyncFile`].
//!
//! Validation mirrors the `CommonBuilder`/`FileLikeBuilderState` pattern used
//! elsewhere for handler construction: a zero value is recorded at
//! `set_*` time but only rejected when `build()` is called, so a builder can
//! be assembled field-by-field before the whole thing is validated at once.

use std::num::{NonZeroU64, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{AsyncFile, SIZE_THRESHOLD};
use crate::dispatcher::{Dispatcher, ThreadTimer};
use crate::error::AsyncFileError;
use crate::os_calls::{OsCalls, UnixOsCalls};
use crate::stats::{AtomicCounters, StatsSink};

/// Immutable construction parameters for an [`AsyncFile`].
#[derive(Debug, Clone)]
pub struct AsyncFileConfig {
    pub path: String,
    pub flush_interval: Duration,
    pub size_threshold: usize,
}

/// Fluent builder for [`AsyncFile`].
///
/// `path` defaults to an empty string (valid only when a non-default
/// `os_calls` is also supplied; see [`AsyncFileBuilder::build`]).
/// `flush_interval` defaults to 40 ms and `size_threshold` to
/// [`SIZE_THRESHOLD`] (64 KiB), both overridable for tests that want to
/// exercise the size short-circuit without a 64 KiB payload.
pub struct AsyncFileBuilder {
    path: String,
    flush_interval: Option<NonZeroU64>,
    flush_interval_set: bool,
    size_threshold: Option<NonZeroUsize>,
    size_threshold_set: bool,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    os_calls: Option<Arc<dyn OsCalls>>,
    stats: Option<Arc<dyn StatsSink>>,
}

impl Default for AsyncFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncFileBuilder {
    pub fn new() -> Self {
        Self {
            path: String::new(),
            flush_interval: None,
            flush_interval_set: false,
            size_threshold: None,
            size_threshold_set: false,
            dispatcher: None,
            os_calls: None,
            stats: None,
        }
    }

    /// Set the path the flusher opens (and reopens) for appended writes.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the periodic flush interval. Zero is recorded for validation but
    /// rejected at `build()`.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_set = true;
        self.flush_interval = NonZeroU64::new(interval.as_millis() as u64);
        self
    }

    /// Set the size threshold above which a single write forces an
    /// immediate flush. Zero is recorded for validation but rejected at
    /// `build()`.
    pub fn size_threshold(mut self, bytes: usize) -> Self {
        self.size_threshold_set = true;
        self.size_threshold = NonZeroUsize::new(bytes);
        self
    }

    /// Inject a custom timer/dispatcher. Defaults to [`ThreadTimer`].
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Inject a custom OS syscall surface.
    ///
    /// Supplying one here means `build()` will not attempt the eager,
    /// synchronous initial open that the default [`UnixOsCalls`] surface
    /// gets; the descriptor opens lazily on the first flush cycle that has
    /// work instead. This is what every test-double configuration wants.
    pub fn os_calls(mut self, os_calls: Arc<dyn OsCalls>) -> Self {
        self.os_calls = Some(os_calls);
        self
    }

    /// Inject a custom stats sink. Defaults to [`AtomicCounters`].
    pub fn stats(mut self, stats: Arc<dyn StatsSink>) -> Self {
        self.stats = Some(stats);
        self
    }

    fn ensure_non_zero(field: &str, was_set: bool, value: bool) -> Result<(), AsyncFileError> {
        if was_set && !value {
            Err(AsyncFileError::InvalidConfig(format!(
                "{field} must be greater than zero"
            )))
        } else {
            Ok(())
        }
    }

    /// Validate and construct the [`AsyncFile`].
    ///
    /// When `os_calls` was not supplied, the default [`UnixOsCalls`] is used
    /// and the initial `open(path)` is attempted synchronously here; a
    /// failure is reported as [`AsyncFileError::Io`] rather than deferred to
    /// the flusher, so a misconfigured path fails construction immediately
    /// for the common real-file case. Every mocked-OS configuration stays
    /// lazy instead: the descriptor opens on the first flush cycle that has
    /// work, never before.
    pub fn build(self) -> Result<AsyncFile, AsyncFileError> {
        Self::ensure_non_zero(
            "flush_interval",
            self.flush_interval_set,
            self.flush_interval.is_some(),
        )?;
        Self::ensure_non_zero(
            "size_threshold",
            self.size_threshold_set,
            self.size_threshold.is_some(),
        )?;

        let flush_interval = self
            .flush_interval
            .map(|ms| Duration::from_millis(ms.get()))
            .unwrap_or(Duration::from_millis(40));
        let size_threshold = self
            .size_threshold
            .map(|n| n.get())
            .unwrap_or(SIZE_THRESHOLD);

        let config = AsyncFileConfig {
            path: self.path,
            flush_interval,
            size_threshold,
        };

        let eager_open = self.os_calls.is_none();
        let os_calls: Arc<dyn OsCalls> = self.os_calls.unwrap_or_else(|| Arc::new(UnixOsCalls));
        let dispatcher: Arc<dyn Dispatcher> =
            self.dispatcher.unwrap_or_else(|| Arc::new(ThreadTimer::new()));
        let stats: Arc<dyn StatsSink> = self.stats.unwrap_or_else(|| Arc::new(AtomicCounters::new()));

        AsyncFile::new(config, dispatcher, os_calls, stats, eager_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os_calls::MockOsCalls;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    fn zero_flush_interval_is_rejected(#[case] millis: u64) {
        let err = AsyncFileBuilder::new()
            .path("/tmp/does-not-matter")
            .os_calls(Arc::new(MockOsCalls::new()))
            .flush_interval(Duration::from_millis(millis))
            .build()
            .expect_err("zero flush_interval must be rejected");
        assert!(matches!(err, AsyncFileError::InvalidConfig(msg) if msg.contains("flush_interval")));
    }

    #[test]
    fn zero_size_threshold_is_rejected() {
        let err = AsyncFileBuilder::new()
            .path("/tmp/does-not-matter")
            .os_calls(Arc::new(MockOsCalls::new()))
            .size_threshold(0)
            .build()
            .expect_err("zero size_threshold must be rejected");
        assert!(matches!(err, AsyncFileError::InvalidConfig(msg) if msg.contains("size_threshold")));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let file = AsyncFileBuilder::new()
            .os_calls(Arc::new(MockOsCalls::new()))
            .build()
            .expect("build with defaults must succeed");
        drop(file);
    }
}
