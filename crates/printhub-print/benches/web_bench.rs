// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for CSRF token scraping and IPP status summarization
// in the printhub-print crate.

use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use printhub_print::csrf::{RegexTokenExtractor, TokenExtractor};
use printhub_print::ipp_client::{StatusAttributes, summarize};

// ---------------------------------------------------------------------------
// Helper: a console page roughly the size the firmware serves
// ---------------------------------------------------------------------------

fn cleaning_page() -> String {
    let mut html = String::from("<html><head><title>Head Cleaning</title></head><body><form>");
    for n in 1..=10 {
        html.push_str(&format!(
            r#"<input type="hidden" id="CSRFToken{n}" name="CSRFToken" value="tok{n:032x}">"#
        ));
        html.push_str(&format!(r#"<button name="btn_def" value="{n}">Clean {n}</button>"#));
    }
    html.push_str(&"<p>filler</p>".repeat(400));
    html.push_str("</form></body></html>");
    html
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_token_extraction(c: &mut Criterion) {
    let page = cleaning_page();
    let extractor = RegexTokenExtractor;

    c.bench_function("extract_token (hit, last element)", |b| {
        b.iter(|| extractor.extract_token(black_box(&page), black_box("CSRFToken10")));
    });

    c.bench_function("extract_token (miss)", |b| {
        b.iter(|| extractor.extract_token(black_box(&page), black_box("CSRFToken3x")));
    });
}

fn bench_status_summary(c: &mut Criterion) {
    let attrs = StatusAttributes {
        marker_levels: vec![55, 60, 65, 70],
        marker_names: vec!["M".into(), "C".into(), "Y".into(), "BK".into()],
        queued_job_count: 12,
        printer_state: "processing".into(),
        state_reasons: vec!["media-low-report".into()],
        is_accepting_jobs: true,
        printer_alert_description: "Printing".into(),
        ..StatusAttributes::default()
    };
    let now = Utc::now();

    c.bench_function("summarize (processing, 12 queued)", |b| {
        b.iter(|| summarize(black_box(&attrs), now));
    });
}

criterion_group!(benches, bench_token_extraction, bench_status_summary);
criterion_main!(benches);
