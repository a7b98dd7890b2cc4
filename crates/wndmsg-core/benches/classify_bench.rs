//! Criterion benchmarks for the capture path.
//!
//! Classification and translation run inside the hooked window procedure on
//! the message-pump thread, so they must stay in the sub-microsecond range
//! for the default rule table.
//!
//! Run with:
//! ```bash
//! cargo bench --package wndmsg-core --bench classify_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wndmsg_core::domain::codes::*;
use wndmsg_core::{Category, Classifier, EventTranslator, Extractor, Pipeline, RawMessage, WindowHandle};

// ── Representative messages ───────────────────────────────────────────────────

const W: WindowHandle = WindowHandle(0x1234);

fn bench_messages() -> Vec<RawMessage> {
    vec![
        RawMessage::new(W, WM_DEVICECHANGE, DBT_DEVICEARRIVAL, 0, 1),
        RawMessage::new(W, WM_POWERBROADCAST, PBT_APMSUSPEND, 0, 2),
        RawMessage::new(W, WM_SIZE, SIZE_MAXIMIZED, 0x0300_0400, 3),
        RawMessage::new(W, WM_SETFOCUS, 0, 0, 4),
        RawMessage::new(W, WM_THEMECHANGED, 0, 0, 5),
        // Unclassified traffic dominates in practice
        RawMessage::new(W, WM_MOUSEMOVE, 0, 0x0010_0020, 6),
        RawMessage::new(W, WM_KEYDOWN, 0x41, 0, 7),
        RawMessage::new(W, WM_USER + 5, 0, 0, 8),
    ]
}

// ── Benchmarks: classification ────────────────────────────────────────────────

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let classifier = Classifier::with_default_rules();
    let messages = bench_messages();
    let first_rule = RawMessage::new(W, WM_DEVICECHANGE, DBT_DEVICEARRIVAL, 0, 1);
    let miss = RawMessage::new(W, WM_MOUSEMOVE, 0, 0, 1);

    group.bench_function("first_rule_hit", |b| {
        b.iter(|| classifier.classify(black_box(&first_rule)).is_some())
    });

    // A miss walks the whole table
    group.bench_function("miss_full_scan", |b| {
        b.iter(|| classifier.classify(black_box(&miss)).is_some())
    });

    group.bench_function("mixed_batch_8", |b| {
        b.iter(|| {
            messages
                .iter()
                .filter(|raw| classifier.classify(black_box(raw)).is_some())
                .count()
        })
    });

    group.finish();
}

// ── Benchmarks: translation ───────────────────────────────────────────────────

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");
    let translator = EventTranslator::new();
    let category = Category::new(Category::WINDOW_SIZE);
    let raw = RawMessage::new(W, WM_SIZE, SIZE_MAXIMIZED, 0x0300_0400, 1);

    group.bench_function("size_extractor", |b| {
        b.iter(|| translator.translate(black_box(&raw), &category, &Extractor::Size))
    });

    group.bench_function("raw_extractor", |b| {
        b.iter(|| translator.translate(black_box(&raw), &category, &Extractor::Raw))
    });

    group.finish();
}

// ── Benchmarks: full capture path ─────────────────────────────────────────────

fn bench_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture");
    let pipeline = Pipeline::new(Classifier::with_default_rules(), 1024);
    let messages = bench_messages();

    // Queue overflows after the first iterations; drop-oldest is part of the cost
    group.bench_function("capture_batch_8", |b| {
        b.iter(|| {
            for raw in &messages {
                black_box(pipeline.capture(raw));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_translate, bench_capture);
criterion_main!(benches);
