//! Property test for the byte-ordering invariant: the concatenation of
//! producer `write()` calls is a prefix of the concatenation of `write`
//! syscalls the OS layer observes (modulo bytes lost to injected failures,
//! which this test never injects).

use std::sync::Arc;
use std::time::Duration;

use asyncfile::{AsyncFileBuilder, ManualDispatcher, MockOsCalls};
use itertools::Itertools;
use proptest::prelude::*;

fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn writes_are_observed_in_order_and_intact(chunks in prop::collection::vec(payload(), 1..20)) {
        let dispatcher = Arc::new(ManualDispatcher::new());
        let os = Arc::new(MockOsCalls::new());
        let file = AsyncFileBuilder::new()
            .dispatcher(Arc::clone(&dispatcher) as Arc<dyn asyncfile::Dispatcher>)
            .os_calls(Arc::clone(&os) as Arc<dyn asyncfile::OsCalls>)
            .flush_interval(Duration::from_millis(40))
            .build()
            .expect("build");

        for chunk in &chunks {
            file.write(chunk);
            // Occasionally force a mid-stream flush so the invariant is
            // checked across multiple flush cycles, not just one.
            if chunk.len().is_multiple_of(7) {
                file.flush();
            }
        }
        file.flush();

        let expected: Vec<u8> = chunks.iter().flatten().copied().collect_vec();
        prop_assert_eq!(os.written_bytes(), expected);
    }
}
