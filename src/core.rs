//! The double-buffered flusher at the heart of [`AsyncFile`].
//!
//! Three logical agents coexist: any number of producer threads calling
//! [`AsyncFile::write`]/[`AsyncFile::flush`]/[`AsyncFile::reopen`]; exactly
//! one flusher thread, spawned at construction, which is the only agent that
//! ever touches the back buffer or the file descriptor; and the injected
//! [`Dispatcher`], which fires the periodic timer on its own reference
//! thread. `front_lock` guards only the front buffer's append and swap and
//! is never held across a syscall; `coord` guards the flag trio the flusher
//! wakes on.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::config::AsyncFileConfig;
use crate::dispatcher::Dispatcher;
use crate::error::AsyncFileError;
use crate::os_calls::OsCalls;
use crate::rate_limited_warner::RateLimitedWarner;
use crate::stats::StatsSink;

/// A single write strictly larger than this forces an immediate flush,
/// independent of the timer.
pub const SIZE_THRESHOLD: usize = 64 * 1024;

/// The front buffer plus a sequence number bumped on every append.
///
/// The sequence number is what lets [`AsyncFile::flush`] name a precise
/// target to wait for instead of "the next completed loop iteration": the
/// flusher stamps [`Coord::last_drained_seq`] with the sequence value that
/// was current *at the moment it swapped the buffer*, so a waiter knows
/// whether its own writes were part of that swap.
struct FrontBuffer {
    buf: Vec<u8>,
    seq: u64,
}

struct Coord {
    flush_requested: bool,
    reopen_pending: bool,
    shutting_down: bool,
    /// Sequence number of the newest write known to have been part of a
    /// completed swap (and then put through a drain attempt, successful or
    /// not). Stamped by the flusher immediately after draining.
    last_drained_seq: u64,
}

struct Shared {
    front: Mutex<FrontBuffer>,
    coord: Mutex<Coord>,
    work_cv: Condvar,
    done_cv: Condvar,
}

impl Shared {
    fn request_flush(&self) {
        let mut coord = self.coord.lock();
        coord.flush_requested = true;
        drop(coord);
        self.work_cv.notify_one();
    }
}

/// Schedules its own next firing from within the callback it runs: the
/// timer must be rearmed after every invocation, whether or not that cycle
/// produced output.
struct PeriodicTick {
    shared: Arc<Shared>,
    dispatcher: Arc<dyn Dispatcher>,
    interval: Duration,
}

impl PeriodicTick {
    fn start(shared: Arc<Shared>, dispatcher: Arc<dyn Dispatcher>, interval: Duration) -> Arc<Self> {
        let tick = Arc::new(Self {
            shared,
            dispatcher,
            interval,
        });
        tick.arm();
        tick
    }

    fn arm(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.dispatcher
            .enable_timer(self.interval, Box::new(move || this.fire()));
    }

    fn fire(self: &Arc<Self>) {
        self.shared.request_flush();
        self.arm();
    }
}

/// Double-buffered, time-and-size-triggered asynchronous append-only file
/// writer. See the crate-level docs for the full contract.
pub struct AsyncFile {
    shared: Arc<Shared>,
    stats: Arc<dyn StatsSink>,
    size_threshold: usize,
    dispatcher: Arc<dyn Dispatcher>,
    worker: Option<JoinHandle<()>>,
    _tick: Arc<PeriodicTick>,
}

impl AsyncFile {
    /// Construct and spawn the flusher thread.
    ///
    /// When `eager_open` is true and `config.path` is non-empty, an initial
    /// synchronous `open` is attempted on the calling thread before the
    /// flusher is spawned; a failure is returned as
    /// [`AsyncFileError::Io`] without spawning anything. When `eager_open`
    /// is false (the shape every mocked-`OsCalls` test configuration wants),
    /// the descriptor opens lazily on the first flush cycle that has work.
    pub(crate) fn new(
        config: AsyncFileConfig,
        dispatcher: Arc<dyn Dispatcher>,
        os_calls: Arc<dyn OsCalls>,
        stats: Arc<dyn StatsSink>,
        eager_open: bool,
    ) -> Result<Self, AsyncFileError> {
        let initial_fd = if eager_open {
            Some(os_calls.open(&config.path)?)
        } else {
            None
        };

        let shared = Arc::new(Shared {
            front: Mutex::new(FrontBuffer {
                buf: Vec::new(),
                seq: 0,
            }),
            coord: Mutex::new(Coord {
                flush_requested: false,
                reopen_pending: false,
                shutting_down: false,
                last_drained_seq: 0,
            }),
            work_cv: Condvar::new(),
            done_cv: Condvar::new(),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            let path = config.path.clone();
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("asyncfile-flusher".into())
                .spawn(move || run_flusher(shared, os_calls, stats, path, initial_fd))
                .expect("spawning the flusher thread must succeed")
        };

        let tick = PeriodicTick::start(
            Arc::clone(&shared),
            Arc::clone(&dispatcher),
            config.flush_interval,
        );

        Ok(Self {
            shared,
            stats,
            size_threshold: config.size_threshold,
            dispatcher,
            worker: Some(worker),
            _tick: tick,
        })
    }

    /// Append `bytes` to the front buffer and return. Never blocks on I/O.
    ///
    /// The bytes of this call are contiguous and in order in the eventual
    /// output. A payload strictly larger than the configured size threshold
    /// forces an immediate flush signal instead of waiting for the timer.
    pub fn write(&self, bytes: &[u8]) {
        let oversized = bytes.len() > self.size_threshold;
        {
            let mut front = self.shared.front.lock();
            front.buf.extend_from_slice(bytes);
            front.seq += 1;
        }
        self.stats.add_write_buffered(bytes.len() as u64);
        if oversized {
            trace!("write of {} bytes exceeds size threshold, forcing flush", bytes.len());
            self.shared.request_flush();
        }
    }

    /// Request an immediate flush and block until a flush cycle that began
    /// no earlier than this call has completed.
    ///
    /// The target is the front buffer's sequence number as of entry, read
    /// under `front_lock` so every `write()` that happens-before this call
    /// (i.e. whose own `front_lock` critical section is serialized before
    /// this one) is guaranteed to be included. Waiting on that sequence
    /// number rather than "one more loop iteration" avoids returning early
    /// when the flusher is mid-cycle on a swap that predates this call: a
    /// loop-iteration counter bumps regardless of which bytes a given swap
    /// actually captured, whereas the sequence number names the writes
    /// precisely.
    ///
    /// Per the startup race documented on [`AsyncFile::new`], "write N bytes
    /// then flush" guarantees at least one syscall covering those bytes, not
    /// exactly one syscall total.
    pub fn flush(&self) {
        let target = self.shared.front.lock().seq;
        let mut coord = self.shared.coord.lock();
        coord.flush_requested = true;
        self.shared.work_cv.notify_one();
        self.shared
            .done_cv
            .wait_while(&mut coord, |c| c.last_drained_seq < target);
    }

    /// Request that the flusher close the current descriptor and reopen the
    /// configured path. Asynchronous: the caller does not block. Writes
    /// continue to be accepted between the call and the next successful
    /// open; if the reopen's `open` fails, subsequent writes are accepted
    /// and discarded until a future `reopen()` succeeds.
    pub fn reopen(&self) {
        let mut coord = self.shared.coord.lock();
        coord.reopen_pending = true;
        drop(coord);
        self.shared.work_cv.notify_one();
    }
}

impl Drop for AsyncFile {
    fn drop(&mut self) {
        {
            let mut coord = self.shared.coord.lock();
            coord.shutting_down = true;
        }
        self.shared.work_cv.notify_one();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.dispatcher.shutdown();
    }
}

// AsyncFile is composed entirely of Send + Sync handles (Arc<dyn Trait>,
// parking_lot primitives, JoinHandle); these hold regardless of target but
// are pinned here because a regression silently turning AsyncFile !Sync
// would only show up as a confusing trait-bound error at a call site far
// from this file.
static_assertions::assert_impl_all!(AsyncFile: Send, Sync);

/// Body of the dedicated flusher thread. Owns the back buffer and the
/// descriptor exclusively; no other thread touches either.
fn run_flusher(
    shared: Arc<Shared>,
    os_calls: Arc<dyn OsCalls>,
    stats: Arc<dyn StatsSink>,
    path: String,
    initial_fd: Option<i32>,
) {
    let mut descriptor = initial_fd;
    let mut descriptor_attempted = initial_fd.is_some();
    let mut back: Vec<u8> = Vec::new();
    let write_warner = RateLimitedWarner::default();
    let reopen_warner = RateLimitedWarner::default();

    loop {
        let (do_reopen, shutting_down) = {
            let mut coord = shared.coord.lock();
            shared.work_cv.wait_while(&mut coord, |c| {
                !(c.flush_requested || c.reopen_pending || c.shutting_down)
            });
            let do_reopen = coord.reopen_pending;
            coord.reopen_pending = false;
            coord.flush_requested = false;
            (do_reopen, coord.shutting_down)
        };

        if do_reopen {
            handle_reopen(&mut descriptor, &os_calls, &path, &stats, &reopen_warner);
            descriptor_attempted = true;
        }

        let swapped_seq = {
            let mut front = shared.front.lock();
            if front.buf.is_empty() {
                None
            } else {
                std::mem::swap(&mut front.buf, &mut back);
                Some(front.seq)
            }
        };

        if let Some(seq) = swapped_seq {
            // The descriptor opens lazily on the first cycle that actually
            // has work. A failed lazy open does not retry on its own; only
            // an explicit `reopen()` tries again.
            if descriptor.is_none() && !descriptor_attempted {
                open_initial_descriptor(&mut descriptor, &os_calls, &path, &stats, &reopen_warner);
                descriptor_attempted = true;
            }
            trace!("flushing {} bytes", back.len());
            drain_back_buffer(&mut descriptor, &mut back, &os_calls, &stats, &write_warner);

            let mut coord = shared.coord.lock();
            if seq > coord.last_drained_seq {
                coord.last_drained_seq = seq;
            }
        }
        shared.done_cv.notify_all();

        if shutting_down {
            let front_empty = shared.front.lock().buf.is_empty();
            if front_empty && back.is_empty() {
                if let Some(fd) = descriptor.take() {
                    let _ = os_calls.close(fd);
                }
                break;
            }
        }
    }
}

/// Perform the one-time lazy initial open of `path`. A failure leaves
/// `descriptor` at `None`; the flusher does not retry on its own — a future
/// successful `reopen()` is what recovers it.
fn open_initial_descriptor(
    descriptor: &mut Option<i32>,
    os_calls: &Arc<dyn OsCalls>,
    path: &str,
    stats: &Arc<dyn StatsSink>,
    warner: &RateLimitedWarner,
) {
    match os_calls.open(path) {
        Ok(fd) => {
            debug!("opened {path} as descriptor {fd}");
            *descriptor = Some(fd);
        }
        Err(err) => {
            stats.add_reopen_failed(1);
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("initial open of {path} failed {count} time(s), most recently: {err}");
            });
            *descriptor = None;
        }
    }
}

fn handle_reopen(
    descriptor: &mut Option<i32>,
    os_calls: &Arc<dyn OsCalls>,
    path: &str,
    stats: &Arc<dyn StatsSink>,
    warner: &RateLimitedWarner,
) {
    if let Some(fd) = descriptor.take() {
        if let Err(err) = os_calls.close(fd) {
            warn!("closing descriptor {fd} for reopen failed: {err}");
        } else {
            debug!("closed descriptor {fd} for reopen");
        }
    }
    match os_calls.open(path) {
        Ok(fd) => {
            debug!("reopened {path} as descriptor {fd}");
            *descriptor = Some(fd);
        }
        Err(err) => {
            stats.add_reopen_failed(1);
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("reopen of {path} failed {count} time(s), most recently: {err}");
            });
            *descriptor = None;
        }
    }
}

/// Write the entirety of `back` through `descriptor`, retrying short writes
/// within this cycle. On a non-recoverable error (or no open descriptor) the
/// remainder is discarded and counted; the bytes are not replayed.
fn drain_back_buffer(
    descriptor: &mut Option<i32>,
    back: &mut Vec<u8>,
    os_calls: &Arc<dyn OsCalls>,
    stats: &Arc<dyn StatsSink>,
    warner: &RateLimitedWarner,
) {
    let Some(fd) = *descriptor else {
        stats.add_write_failed(back.len() as u64);
        back.clear();
        return;
    };

    let mut offset = 0;
    while offset < back.len() {
        match os_calls.write(fd, &back[offset..]) {
            Ok(0) => {
                // No forward progress without an error; treat as a failure
                // rather than spin.
                if offset > 0 {
                    stats.add_write_completed(offset as u64);
                }
                stats.add_write_failed((back.len() - offset) as u64);
                warner.record_drop();
                warner.warn_if_due(|count| {
                    warn!("write to descriptor {fd} stalled {count} time(s) with no error");
                });
                back.clear();
                return;
            }
            Ok(n) => offset += n,
            Err(err) => {
                if offset > 0 {
                    stats.add_write_completed(offset as u64);
                }
                stats.add_write_failed((back.len() - offset) as u64);
                warner.record_drop();
                warner.warn_if_due(|count| {
                    warn!("write to descriptor {fd} failed {count} time(s), most recently: {err}");
                });
                back.clear();
                return;
            }
        }
    }
    stats.add_write_completed(back.len() as u64);
    back.clear();
}
