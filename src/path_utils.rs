//! Synchronous path-existence helpers.
//!
//! These sit outside the core: the flusher never calls them, and they
//! perform ordinary blocking filesystem syscalls. They exist so callers can
//! validate a configured path before handing it to an
//! [`crate::AsyncFileBuilder`], e.g. to confirm the parent directory of a
//! log file actually exists.

use std::fs;
use std::io;
use std::path::Path;

/// Returns `true` if `path` exists and is a regular file (or a symlink that
/// resolves to one).
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Returns `true` if `path` exists and is a directory.
pub fn directory_exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Read the entire contents of `path` into a `String`.
pub fn read_to_end(path: impl AsRef<Path>) -> io::Result<String> {
    fs::read_to_string(path)
}
