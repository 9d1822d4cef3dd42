//! Injectable OS syscall surface.
//!
//! The flusher never calls `open`/`write`/`close` directly; it goes through
//! an [`OsCalls`] implementation so the cross-thread handoff and reopen
//! protocol can be exercised against a deterministic test double instead of
//! a real file descriptor.

use std::io;

use libc::{c_void, mode_t};
use log::error;

/// Mode bits used when opening the log file: owner read/write, group and
/// other read.
const OPEN_MODE: mode_t = 0o644;

/// Capability bundle for the three syscalls the flusher needs.
///
/// Any negative return from the underlying syscall is surfaced as an
/// `io::Error`; the core never inspects `errno` beyond success/failure.
pub trait OsCalls: Send + Sync {
    /// Open `path` for appended writes, creating it if necessary.
    fn open(&self, path: &str) -> io::Result<i32>;
    /// Write as much of `buf` as the underlying descriptor accepts in one
    /// call. A short write returns `Ok(n)` with `n < buf.len()`.
    fn write(&self, fd: i32, buf: &[u8]) -> io::Result<usize>;
    /// Close a descriptor previously returned by [`OsCalls::open`].
    fn close(&self, fd: i32) -> io::Result<()>;
}

/// Real [`OsCalls`] backed by `libc::{open, write, close}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixOsCalls;

impl OsCalls for UnixOsCalls {
    fn open(&self, path: &str) -> io::Result<i32> {
        let c_path = match std::ffi::CString::new(path) {
            Ok(c_path) => c_path,
            Err(_) => return Err(io::Error::from(io::ErrorKind::InvalidInput)),
        };
        let fd = unsafe {
            libc::open(
                c_path.as_ptr(),
                libc::O_APPEND | libc::O_CREAT | libc::O_WRONLY,
                OPEN_MODE,
            )
        };
        if fd < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(fd)
        }
    }

    fn write(&self, fd: i32, buf: &[u8]) -> io::Result<usize> {
        let rc = unsafe { libc::write(fd, buf.as_ptr() as *const c_void, buf.len()) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }

    fn close(&self, fd: i32) -> io::Result<()> {
        let rc = unsafe { libc::close(fd) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            error!("close({fd}) failed: {err}");
            Err(err)
        } else {
            Ok(())
        }
    }
}

pub use mock::{MockOsCalls, OpenResult, OsEvent};

/// Deterministic [`OsCalls`] test double, kept in the public API so callers
/// can exercise their own wrappers around [`crate::AsyncFile`] without
/// touching a real file descriptor.
mod mock {
    use super::OsCalls;
    use parking_lot::Mutex;
    use std::io;

    /// One observed syscall, in the order the flusher issued it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum OsEvent {
        Open { path: String, result: OpenResult },
        Write { fd: i32, data: Vec<u8> },
        Close { fd: i32 },
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum OpenResult {
        Fd(i32),
        Err,
    }

    /// Deterministic [`OsCalls`] test double.
    ///
    /// Hands out file descriptors from a configured sequence (defaulting to
    /// `5, 10, 15, ...`) and records every syscall it observes so tests can
    /// assert ordering (e.g. `write(5, ..)` never follows `close(5)`).
    pub struct MockOsCalls {
        inner: Mutex<Inner>,
    }

    struct Inner {
        events: Vec<OsEvent>,
        next_fds: Vec<i32>,
        fail_next_open: bool,
        fail_next_write: bool,
    }

    impl Default for MockOsCalls {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockOsCalls {
        /// Create a mock that opens descriptors `5, 10, 15, ...` in order.
        pub fn new() -> Self {
            Self::with_fds(vec![5, 10, 15, 20])
        }

        /// Create a mock that hands out `fds` in order, one per successful
        /// `open` call.
        pub fn with_fds(fds: Vec<i32>) -> Self {
            Self {
                inner: Mutex::new(Inner {
                    events: Vec::new(),
                    next_fds: fds,
                    fail_next_open: false,
                    fail_next_write: false,
                }),
            }
        }

        /// Make the next `open` call return an error.
        pub fn fail_next_open(&self) {
            self.inner.lock().fail_next_open = true;
        }

        /// Make the next `write` call return an error.
        pub fn fail_next_write(&self) {
            self.inner.lock().fail_next_write = true;
        }

        /// Snapshot of every syscall observed so far, in order.
        pub fn events(&self) -> Vec<OsEvent> {
            self.inner.lock().events.clone()
        }

        /// Concatenation of every byte handed to `write` across all fds, in
        /// call order. Useful for asserting the byte-ordering invariant.
        pub fn written_bytes(&self) -> Vec<u8> {
            self.inner
                .lock()
                .events
                .iter()
                .filter_map(|e| match e {
                    OsEvent::Write { data, .. } => Some(data.clone()),
                    _ => None,
                })
                .flatten()
                .collect()
        }
    }

    impl OsCalls for MockOsCalls {
        fn open(&self, path: &str) -> io::Result<i32> {
            let mut inner = self.inner.lock();
            if inner.fail_next_open {
                inner.fail_next_open = false;
                inner.events.push(OsEvent::Open {
                    path: path.to_string(),
                    result: OpenResult::Err,
                });
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            let fd = if inner.next_fds.is_empty() {
                1
            } else {
                inner.next_fds.remove(0)
            };
            inner.events.push(OsEvent::Open {
                path: path.to_string(),
                result: OpenResult::Fd(fd),
            });
            Ok(fd)
        }

        fn write(&self, fd: i32, buf: &[u8]) -> io::Result<usize> {
            let mut inner = self.inner.lock();
            if inner.fail_next_write {
                inner.fail_next_write = false;
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            inner.events.push(OsEvent::Write {
                fd,
                data: buf.to_vec(),
            });
            Ok(buf.len())
        }

        fn close(&self, fd: i32) -> io::Result<()> {
            self.inner.lock().events.push(OsEvent::Close { fd });
            Ok(())
        }
    }
}
