use std::sync::Arc;
use std::time::Duration;

use asyncfile::{AsyncFileBuilder, ManualDispatcher, MockOsCalls};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn build_file(dispatcher: &Arc<ManualDispatcher>, os: &Arc<MockOsCalls>) -> asyncfile::AsyncFile {
    AsyncFileBuilder::new()
        .dispatcher(Arc::clone(dispatcher) as Arc<dyn asyncfile::Dispatcher>)
        .os_calls(Arc::clone(os) as Arc<dyn asyncfile::OsCalls>)
        .flush_interval(Duration::from_secs(3600))
        .build()
        .expect("build asyncfile")
}

fn flush_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("asyncfile_flush");

    group.bench_function("write_small_payload", |b| {
        let dispatcher = Arc::new(ManualDispatcher::new());
        let os = Arc::new(MockOsCalls::with_fds(vec![5]));
        let file = build_file(&dispatcher, &os);
        let payload = b"2026-07-28T00:00:00Z INFO request served in 4ms\n";
        b.iter(|| {
            file.write(black_box(payload));
        });
    });

    group.bench_function("buffer_swap_and_drain", |b| {
        let dispatcher = Arc::new(ManualDispatcher::new());
        let os = Arc::new(MockOsCalls::with_fds(vec![5]));
        let file = build_file(&dispatcher, &os);
        let payload = vec![b'x'; 4096];
        b.iter(|| {
            file.write(black_box(&payload));
            file.flush();
        });
    });

    group.finish();
}

criterion_group!(benches, flush_benchmarks);
criterion_main!(benches);
