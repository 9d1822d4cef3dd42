//! Injectable timer/dispatcher used to trigger periodic flushes.
//!
//! [`Dispatcher`] models a single one-shot timer: [`Dispatcher::enable_timer`]
//! schedules exactly one future invocation of `callback`. The callback is
//! responsible for re-arming the timer if it wants another tick — the core's
//! [`crate::AsyncFile`] always does this unconditionally, matching the
//! "timer re-armed after every callback, whether or not the cycle produced
//! output" property the flusher relies on.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};
use parking_lot::Mutex;

/// A one-shot timer callback.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Scheduler of one-shot callbacks on a reference thread.
pub trait Dispatcher: Send + Sync {
    /// Invoke `callback` once, after `interval` has elapsed.
    fn enable_timer(&self, interval: Duration, callback: TimerCallback);

    /// Cancel any pending timer and release the dispatcher's background
    /// resources. Called once at [`crate::AsyncFile`] teardown; the default
    /// no-op is appropriate for dispatchers with no owned thread.
    fn shutdown(&self) {}
}

/// Commands sent to [`ThreadTimer`]'s dedicated worker thread.
enum Message {
    Arm(Duration, TimerCallback),
    Shutdown,
}

/// A handful of arm/shutdown commands in flight at once is plenty; the
/// worker processes one at a time and the flusher only ever has a single
/// timer armed.
const CHANNEL_CAPACITY: usize = 8;

/// Default threaded [`Dispatcher`]: a dedicated thread that sleeps for the
/// requested interval, then runs the callback, one arming at a time.
pub struct ThreadTimer {
    tx: Mutex<Option<Sender<Message>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadTimer {
    pub fn new() -> Self {
        let (tx, rx) = bounded::<Message>(CHANNEL_CAPACITY);
        let handle = thread::spawn(move || {
            for message in rx {
                match message {
                    Message::Arm(interval, callback) => {
                        thread::sleep(interval);
                        callback();
                    }
                    Message::Shutdown => break,
                }
            }
        });
        Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }
}

impl Dispatcher for ThreadTimer {
    fn enable_timer(&self, interval: Duration, callback: TimerCallback) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Message::Arm(interval, callback));
        }
    }

    fn shutdown(&self) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(Message::Shutdown);
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Test [`Dispatcher`] that never fires on its own; a test drives it
/// explicitly with [`ManualDispatcher::fire`].
#[derive(Default)]
pub struct ManualDispatcher {
    pending: Mutex<Option<(Duration, TimerCallback)>>,
    arm_count: std::sync::atomic::AtomicUsize,
}

impl ManualDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the currently-armed callback, if any, synchronously on the
    /// calling thread. Returns `false` if no timer was armed.
    pub fn fire(&self) -> bool {
        let pending = self.pending.lock().take();
        match pending {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Number of times `enable_timer` has been called, including the
    /// initial arming performed at construction.
    pub fn arm_count(&self) -> usize {
        self.arm_count.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// The interval most recently passed to `enable_timer`, if any.
    pub fn last_interval(&self) -> Option<Duration> {
        self.pending.lock().as_ref().map(|(interval, _)| *interval)
    }
}

impl Dispatcher for ManualDispatcher {
    fn enable_timer(&self, interval: Duration, callback: TimerCallback) {
        self.arm_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.pending.lock() = Some((interval, callback));
    }
}
