// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement: grayscale, global (Otsu) and adaptive binarization, and
// the combined "magic" filter offered after cropping.

use image::{DynamicImage, GrayImage, Luma};
use scanwerk_bridge::{EditOutcome, ImageEnhancer};
use scanwerk_core::types::ImageArtifact;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::image::processor::ImageProcessor;

/// Adaptive threshold neighbourhood radius used by the magic filter.
pub const MAGIC_BLOCK_RADIUS: u32 = 15;
/// Offset below the local mean a pixel must fall to turn black.
pub const MAGIC_OFFSET: i32 = 10;
/// Contrast boost applied before adaptive thresholding.
pub const MAGIC_CONTRAST: f32 = 1.4;

/// Filters the enhancement step can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagicFilter {
    Grayscale,
    /// Global threshold chosen from the histogram.
    BlackAndWhite,
    /// Grayscale, contrast boost, then a local-mean threshold.
    #[default]
    Magic,
}

/// Pixel-level enhancement on a single image.
#[derive(Debug, Clone)]
pub struct ScanEnhancer {
    image: DynamicImage,
}

impl ScanEnhancer {
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    pub fn apply(self, filter: MagicFilter) -> Self {
        match filter {
            MagicFilter::Grayscale => self.grayscale(),
            MagicFilter::BlackAndWhite => self.binarize_otsu(),
            MagicFilter::Magic => self.magic(),
        }
    }

    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Threshold against the local mean of a `block_radius` neighbourhood
    /// minus `offset`.
    #[instrument(skip(self))]
    pub fn binarize(self, block_radius: u32, offset: i32) -> Self {
        let gray = self.image.to_luma8();
        let (width, height) = gray.dimensions();
        let table = SummedArea::new(&gray);

        let output = GrayImage::from_fn(width, height, |x, y| {
            let threshold = (table.mean_around(x, y, block_radius) as i32 - offset).clamp(0, 255);
            let value = gray.get_pixel(x, y).0[0] as i32;
            Luma([if value < threshold { 0 } else { 255 }])
        });
        Self {
            image: DynamicImage::ImageLuma8(output),
        }
    }

    /// Global threshold from Otsu's method.
    #[instrument(skip(self))]
    pub fn binarize_otsu(self) -> Self {
        let gray = self.image.to_luma8();
        let threshold = otsu_threshold(&gray);
        debug!(threshold, "Otsu threshold computed");

        let output = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([if gray.get_pixel(x, y).0[0] <= threshold { 0 } else { 255 }])
        });
        Self {
            image: DynamicImage::ImageLuma8(output),
        }
    }

    #[instrument(skip(self))]
    pub fn magic(self) -> Self {
        let boosted = ImageProcessor::from_dynamic(self.image)
            .grayscale()
            .adjust_contrast(MAGIC_CONTRAST)
            .into_dynamic();
        Self { image: boosted }.binarize(MAGIC_BLOCK_RADIUS, MAGIC_OFFSET)
    }
}

/// Enhancement step that applies one [`MagicFilter`] and returns the result
/// as an in-memory raster.
#[derive(Debug, Clone, Default)]
pub struct MagicEnhancer {
    filter: MagicFilter,
}

impl MagicEnhancer {
    pub fn new(filter: MagicFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> MagicFilter {
        self.filter
    }
}

impl ImageEnhancer for MagicEnhancer {
    fn apply(&mut self, input: &ImageArtifact) -> EditOutcome {
        let image = match input.load() {
            Ok(image) => image,
            Err(err) => {
                warn!(error = %err, "Enhancement input unreadable; leaving image unchanged");
                return EditOutcome::Cancelled;
            }
        };
        let enhanced = ScanEnhancer::from_dynamic(image).apply(self.filter).into_dynamic();
        info!(filter = ?self.filter, "Enhancement applied");
        EditOutcome::Applied(ImageArtifact::raster(enhanced))
    }
}

// -- Helpers ------------------------------------------------------------------

/// Summed-area table with a zero border row and column.
struct SummedArea {
    sums: Vec<u64>,
    width: u32,
    height: u32,
}

impl SummedArea {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = width as usize + 1;
        let mut sums = vec![0u64; stride * (height as usize + 1)];
        for y in 0..height as usize {
            let mut row = 0u64;
            for x in 0..width as usize {
                row += gray.get_pixel(x as u32, y as u32).0[0] as u64;
                sums[(y + 1) * stride + x + 1] = row + sums[y * stride + x + 1];
            }
        }
        Self { sums, width, height }
    }

    /// Mean over the square of `radius` around (cx, cy), clipped to the image.
    fn mean_around(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        let stride = self.width as usize + 1;
        let x0 = cx.saturating_sub(radius) as usize;
        let y0 = cy.saturating_sub(radius) as usize;
        let x1 = (cx.saturating_add(radius).saturating_add(1)).min(self.width) as usize;
        let y1 = (cy.saturating_add(radius).saturating_add(1)).min(self.height) as usize;

        let area = ((x1 - x0) * (y1 - y0)) as f64;
        if area == 0.0 {
            return 128.0;
        }
        let total = self.sums[y1 * stride + x1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1]
            - self.sums[y1 * stride + x0];
        total as f64 / area
    }
}

/// Threshold maximising between-class variance; pixels at or below it are
/// the dark class.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 127;
    }
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut weighted_dark = 0.0f64;
    let mut dark = 0u64;
    let mut best = (0.0f64, 0u8);

    for (level, &count) in histogram.iter().enumerate() {
        dark += count;
        if dark == 0 {
            continue;
        }
        let light = total - dark;
        if light == 0 {
            break;
        }
        weighted_dark += level as f64 * count as f64;
        let mean_dark = weighted_dark / dark as f64;
        let mean_light = (weighted_total - weighted_dark) / light as f64;
        let variance = dark as f64 * light as f64 * (mean_dark - mean_light).powi(2);
        if variance > best.0 {
            best = (variance, level as u8);
        }
    }
    best.1
}
