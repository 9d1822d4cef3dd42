//! Error types surfaced at construction time.
//!
//! Runtime write and reopen failures are never returned to callers; they are
//! absorbed into [`crate::stats::StatsSink`] counters and rate-limited log
//! warnings per the producer API's no-fail, no-block contract. Only
//! construction-time validation and the initial descriptor open can fail.

use std::io;
use thiserror::Error;

/// Failure constructing an [`crate::AsyncFile`].
#[derive(Debug, Error)]
pub enum AsyncFileError {
    /// The initial synchronous open of the configured path failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A builder field failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
