//! Criterion benchmarks for the event queue.
//!
//! `push` runs on the message-pump thread under a short lock; `drain_all`
//! runs once per host tick.  Both are measured at the default capacity.
//!
//! Run with:
//! ```bash
//! cargo bench --package wndmsg-core --bench queue_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wndmsg_core::{Category, EventPayload, EventQueue, TranslatedEvent, WindowHandle};

const DEFAULT_CAPACITY: usize = 1024;

fn event(sequence: u64) -> TranslatedEvent {
    TranslatedEvent {
        category: Category::new(Category::DEVICE_CHANGE),
        payload: EventPayload::Raw {
            code: 0x219,
            wparam: 0x8000,
            lparam: 0,
        },
        window: WindowHandle(0x1234),
        timestamp_ms: sequence,
        sequence,
    }
}

// ── Benchmarks: push ──────────────────────────────────────────────────────────

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push");

    group.bench_function("push_with_room", |b| {
        let queue = EventQueue::new(DEFAULT_CAPACITY);
        let mut seq = 0u64;
        b.iter(|| {
            seq += 1;
            if queue.len() == DEFAULT_CAPACITY {
                queue.drain_all();
            }
            queue.push(black_box(event(seq)))
        })
    });

    // Full queue: every push evicts the oldest event
    group.bench_function("push_overflowing", |b| {
        let queue = EventQueue::new(DEFAULT_CAPACITY);
        for seq in 0..DEFAULT_CAPACITY as u64 {
            queue.push(event(seq));
        }
        let mut seq = DEFAULT_CAPACITY as u64;
        b.iter(|| {
            seq += 1;
            queue.push(black_box(event(seq)))
        })
    });

    group.finish();
}

// ── Benchmarks: drain ─────────────────────────────────────────────────────────

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_drain");

    for batch in [1usize, 64, DEFAULT_CAPACITY] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let queue = EventQueue::new(DEFAULT_CAPACITY);
            b.iter(|| {
                for seq in 0..batch as u64 {
                    queue.push(event(seq));
                }
                black_box(queue.drain_all())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_push, bench_drain);
criterion_main!(benches);
