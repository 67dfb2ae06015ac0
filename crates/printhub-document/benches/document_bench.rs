// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the in-process parts of the document pipeline:
// the fallback preview renderer and ZIP bundling.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use printhub_document::bundle::zip_entries;
use printhub_document::preview::placeholder_jpeg;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Render and encode the 300x400 blank preview.
fn bench_placeholder(c: &mut Criterion) {
    c.bench_function("placeholder_jpeg (300x400)", |b| {
        b.iter(|| black_box(placeholder_jpeg().ok()));
    });
}

/// Zip ten 256 KiB pages, roughly a multi-page JPEG scan at normal quality.
fn bench_zip(c: &mut Criterion) {
    let page: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    let entries: Vec<(String, Vec<u8>)> = (1..=10)
        .map(|n| (format!("scan_{n}.jpg"), page.clone()))
        .collect();

    c.bench_function("zip_entries (10 x 256 KiB)", |b| {
        b.iter(|| black_box(zip_entries(black_box(&entries)).ok()));
    });
}

criterion_group!(benches, bench_placeholder, bench_zip);
criterion_main!(benches);
