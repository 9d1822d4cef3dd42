//! Loom model check for concurrent producers racing `write()`/`flush()`
//! against the flusher thread. Exercises the front-buffer handoff, not the
//! flusher's own OS syscalls: the flusher is a real `std::thread`, outside
//! loom's model, so only the producer-facing contract is checked here.

use std::sync::Arc;
use std::time::Duration;

use asyncfile::{AsyncFileBuilder, ManualDispatcher, MockOsCalls};

#[test]
#[ignore]
fn loom_concurrent_writers_preserve_each_calls_bytes() {
    loom::model(|| {
        let dispatcher = Arc::new(ManualDispatcher::new());
        let os = Arc::new(MockOsCalls::new());
        let file = Arc::new(
            AsyncFileBuilder::new()
                .dispatcher(Arc::clone(&dispatcher) as Arc<dyn asyncfile::Dispatcher>)
                .os_calls(Arc::clone(&os) as Arc<dyn asyncfile::OsCalls>)
                .flush_interval(Duration::from_millis(40))
                .build()
                .expect("build"),
        );

        let mut threads = Vec::new();
        for id in 0..2u8 {
            let file = Arc::clone(&file);
            threads.push(loom::thread::spawn(move || {
                file.write(&[id; 4]);
                file.flush();
            }));
        }
        for t in threads {
            t.join().expect("producer thread panicked");
        }

        let written = os.written_bytes();
        for id in 0..2u8 {
            let needle = [id; 4];
            let contains = written
                .windows(needle.len())
                .any(|window| window == needle);
            assert!(contains, "bytes from producer {id} must appear intact in the output");
        }
    });
}
