// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for scanwerk-document: the magic filter and the
// size-bounded compression loop on a synthetic page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use scanwerk_core::types::{CompressParams, ImageFormat};
use scanwerk_document::{ImageCompressor, ImageProcessor, MagicFilter, ScanEnhancer};

/// 400x300 light page with dark "text" rows on a dark frame.
fn synthetic_page() -> DynamicImage {
    let mut img = GrayImage::from_pixel(400, 300, Luma([40u8]));
    for y in 20..280 {
        for x in 20..380 {
            let ink = y % 12 < 2 && x % 7 != 0;
            img.put_pixel(x, y, Luma([if ink { 25 } else { 230 }]));
        }
    }
    DynamicImage::ImageLuma8(img)
}

fn bench_magic_filter(c: &mut Criterion) {
    let page = synthetic_page();
    c.bench_function("magic_filter (400x300)", |b| {
        b.iter(|| {
            let out = ScanEnhancer::from_dynamic(black_box(page.clone())).apply(MagicFilter::Magic);
            black_box(out.into_dynamic());
        });
    });
}

fn bench_bounded_compression(c: &mut Criterion) {
    let page = synthetic_page();
    let params = CompressParams {
        quality: 100,
        format: ImageFormat::Jpeg,
        max_size: Some(4 * 1024),
    };
    c.bench_function("compress_to_4k (400x300 jpeg)", |b| {
        b.iter(|| {
            let processor = ImageProcessor::from_dynamic(black_box(page.clone()));
            black_box(ImageCompressor::fit(processor, &params).ok());
        });
    });
}

criterion_group!(benches, bench_magic_filter, bench_bounded_compression);
criterion_main!(benches);
