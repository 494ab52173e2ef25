//! Event delivery benchmark suite.
//!
//! Measures notification throughput without a network:
//! - `apply`: registry translation alone, at different socket counts
//! - `bridge`: end to end through the delivery thread into a sink
//!
//! Run with: cargo bench --bench delivery
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use netbridge::protocol::Notification;
use netbridge::{Bridge, Event, Handle, MemoryTransport, SessionRegistry, UserContext};
use tokio::sync::mpsc::{self, UnboundedReceiver};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const SOCKET_COUNTS: &[usize] = &[1, 64, 1024];
const MESSAGES_PER_ITER: usize = 1024;

// ============================================================================
// Helpers
// ============================================================================

fn open_sockets(
    count: usize,
) -> (SessionRegistry, MemoryTransport, UnboundedReceiver<Notification>, Vec<Handle>) {
    let transport = MemoryTransport::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let registry = SessionRegistry::new(Arc::new(transport.clone()), Arc::new(transport.clone()), tx);

    let handles: Vec<Handle> = (0..count)
        .map(|i| {
            let handle = registry
                .open_socket("wss://bench.local/", UserContext::new(i))
                .unwrap();
            transport.connected(handle);
            handle
        })
        .collect();

    while let Ok(notification) = rx.try_recv() {
        registry.apply(notification);
    }

    (registry, transport, rx, handles)
}

// ============================================================================
// Benchmark: Registry Apply
// ============================================================================

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    group.throughput(Throughput::Elements(MESSAGES_PER_ITER as u64));

    for &count in SOCKET_COUNTS {
        let (registry, transport, mut rx, handles) = open_sockets(count);

        group.bench_with_input(BenchmarkId::new("messages", count), &count, |b, _| {
            b.iter(|| {
                for i in 0..MESSAGES_PER_ITER {
                    transport.message(handles[i % handles.len()], "payload");
                }
                let mut delivered = 0;
                while let Ok(notification) = rx.try_recv() {
                    delivered += usize::from(registry.apply(notification).is_some());
                }
                assert_eq!(delivered, MESSAGES_PER_ITER);
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: End to End
// ============================================================================

fn bench_bridge(c: &mut Criterion) {
    let transport = MemoryTransport::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);

    let bridge = Bridge::builder()
        .worker_threads(1)
        .transport(transport.clone())
        .event_sink(move |_: &Event| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .build()
        .unwrap();

    let handle = bridge
        .open_socket("wss://bench.local/", UserContext::new(1))
        .unwrap();
    transport.connected(handle);
    while delivered.load(Ordering::Relaxed) == 0 {
        thread::yield_now();
    }

    let mut group = c.benchmark_group("bridge");
    group.throughput(Throughput::Elements(MESSAGES_PER_ITER as u64));

    group.bench_function("messages", |b| {
        b.iter(|| {
            let target = delivered.load(Ordering::Relaxed) + MESSAGES_PER_ITER;
            for _ in 0..MESSAGES_PER_ITER {
                transport.message(handle, "payload");
            }
            while delivered.load(Ordering::Relaxed) < target {
                thread::yield_now();
            }
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_apply, bench_bridge);
criterion_main!(benches);
