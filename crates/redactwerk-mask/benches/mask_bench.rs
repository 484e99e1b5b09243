// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the redactwerk-mask crate: composite rendering and
// patch extraction on a synthetic page with a few redaction strokes.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use redactwerk_core::MaskTarget;
use redactwerk_mask::{Compositor, HistoryStore, PatchExtractor};

/// Build a 600x800 "page" (light background with dark text bands) and paint
/// three redactions into the committed mask.
fn redacted_page() -> Compositor {
    let page = RgbImage::from_fn(600, 800, |x, y| {
        if y % 24 < 10 && x % 7 != 0 {
            Rgb([30, 30, 30])
        } else {
            Rgb([245, 245, 240])
        }
    });

    let mut compositor = Compositor::new();
    compositor
        .load(DynamicImage::ImageRgb8(page))
        .expect("synthetic page loads");
    compositor.add_rectangle(50, 100, 350, 130, MaskTarget::Committed);
    compositor.add_ellipse(400, 300, 550, 380, MaskTarget::Committed);
    compositor.add_line(60, 600, 500, 640, 20, MaskTarget::Committed);
    compositor
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Final render with the default blur settings (intensity 15, 5 passes).
fn bench_render(c: &mut Criterion) {
    let compositor = redacted_page();
    c.bench_function("render final (600x800, 15/5)", |b| {
        b.iter(|| black_box(compositor.render(black_box(15), black_box(5), false)));
    });
}

/// Connected-region extraction plus DEFLATE of each patch.
fn bench_extract(c: &mut Criterion) {
    let compositor = redacted_page();
    let mask = compositor.current_mask().expect("mask present").clone();
    c.bench_function("extract patches (600x800)", |b| {
        b.iter(|| black_box(PatchExtractor::extract(black_box(&mask))));
    });
}

/// Undo/redo round trip through a full history.
fn bench_undo_redo(c: &mut Criterion) {
    let compositor = redacted_page();
    let mask = compositor.current_mask().expect("mask present").clone();
    let shape = compositor.dimensions().expect("document loaded");

    let mut store = HistoryStore::default();
    for _ in 0..20 {
        store.push(PatchExtractor::extract(&mask).expect("extract"), None);
    }

    c.bench_function("undo + redo (20 entries)", |b| {
        b.iter(|| {
            black_box(store.undo(shape).expect("undo"));
            black_box(store.redo(shape).expect("redo"));
        });
    });
}

criterion_group!(benches, bench_render, bench_extract, bench_undo_redo);
criterion_main!(benches);
