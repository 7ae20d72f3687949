//! Performance benchmarks for PDF Eye-Saver
//!
//! Run with: `cargo bench`

#[path = "../tests/common/mod.rs"]
mod common;

use base64::Engine;
use common::{scanned_pdf, text_pdf};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdf_eye_saver::pdf::{
    page_count, recolor_background, BackgroundMode, BackgroundOptions, DEFAULT_BACKGROUND,
};
use pdf_eye_saver::server::ChangeBackgroundParams;
use pdf_eye_saver::{PdfServer, PdfSource};

/// Benchmark the background transform across document sizes
fn bench_recolor(c: &mut Criterion) {
    let mut group = c.benchmark_group("recolor_background");

    for pages in [1usize, 10, 100] {
        let data = text_pdf(pages);
        group.throughput(Throughput::Bytes(data.len() as u64));

        for mode in [BackgroundMode::Standard, BackgroundMode::Overlay] {
            let options = BackgroundOptions::new(DEFAULT_BACKGROUND, mode);
            group.bench_with_input(
                BenchmarkId::new(mode.as_str(), format!("{}pages", pages)),
                &data,
                |b, data| {
                    b.iter(|| recolor_background(black_box(data), &options).unwrap());
                },
            );
        }
    }

    let scan = scanned_pdf();
    let overlay = BackgroundOptions::new(DEFAULT_BACKGROUND, BackgroundMode::Overlay);
    group.bench_function("overlay/scanned", |b| {
        b.iter(|| recolor_background(black_box(&scan), &overlay).unwrap());
    });

    group.finish();
}

/// Benchmark PDF parsing alone, for comparison with the transform
fn bench_page_count(c: &mut Criterion) {
    let data = text_pdf(100);

    let mut group = c.benchmark_group("page_count");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("100pages", |b| {
        b.iter(|| page_count(black_box(&data)).unwrap());
    });
    group.finish();
}

/// Benchmark a full tool call: base64 decode, transform, cache insert
fn bench_server_change_background(c: &mut Criterion) {
    let server = PdfServer::new();
    let encoded = base64::engine::general_purpose::STANDARD.encode(text_pdf(10));

    c.bench_function("server/change_background_10pages", |b| {
        b.iter(|| {
            let params = ChangeBackgroundParams {
                source: PdfSource::Base64 {
                    base64: encoded.clone(),
                    file_name: Some("bench.pdf".to_string()),
                },
                color: "#FFFFCC".to_string(),
                mode: "standard".to_string(),
                overlay_opacity: None,
                output_path: None,
                include_data: false,
            };
            tokio_test::block_on(server.process_change_background(&params)).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_recolor,
    bench_page_count,
    bench_server_change_background
);
criterion_main!(benches);
