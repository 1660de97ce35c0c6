// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, scale, grayscale, contrast, and encode to one of
// the scan output formats. Operates on in-memory images using the
// `image` crate.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{ImageFormat, open_oriented};
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Transformations consume `self` and return a new `ImageProcessor`, so calls
/// chain:
///
/// ```ignore
/// let bytes = ImageProcessor::open("original.jpg")?
///     .grayscale()
///     .adjust_contrast(1.4)
///     .encode(ImageFormat::Jpeg, 80)?;
/// ```
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path, upright per its EXIF orientation.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let img = open_oriented(path.as_ref())?;
        debug!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| ScanwerkError::ImageDecode(format!("failed to decode image: {err}")))?;
        Ok(Self { image: img })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Scale both dimensions by `factor`, never below one pixel.
    #[instrument(skip(self))]
    pub fn scale(self, factor: f32) -> Self {
        let width = ((self.image.width() as f32 * factor).round() as u32).max(1);
        let height = ((self.image.height() as f32 * factor).round() as u32).max(1);
        debug!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            width,
            height,
            "Scaling image"
        );
        Self {
            image: self.image.resize_exact(width, height, FilterType::Triangle),
        }
    }

    pub fn grayscale(self) -> Self {
        Self {
            image: self.image.grayscale(),
        }
    }

    /// Adjust contrast by a factor around mid-gray. 1.0 is a no-op.
    #[instrument(skip(self))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let luma = self.image.to_luma8();
        let contrasted = image::ImageBuffer::from_fn(luma.width(), luma.height(), |x, y| {
            let value = luma.get_pixel(x, y).0[0] as f32;
            image::Luma([(factor * (value - 128.0) + 128.0).clamp(0.0, 255.0) as u8])
        });
        Self {
            image: DynamicImage::ImageLuma8(contrasted),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode into `format`.
    ///
    /// `quality` (1-100) only affects JPEG; PNG and WebP are written lossless.
    #[instrument(skip(self))]
    pub fn encode(&self, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let written = match format {
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
                self.image.to_rgb8().write_with_encoder(encoder)
            }
            ImageFormat::Png => {
                let encoder = PngEncoder::new(&mut buffer);
                self.image.to_rgba8().write_with_encoder(encoder)
            }
            ImageFormat::Webp => {
                let encoder = WebPEncoder::new_lossless(&mut buffer);
                self.image.to_rgba8().write_with_encoder(encoder)
            }
        };
        written.map_err(|err| {
            ScanwerkError::ImageEncode(format!("{} encoding failed: {err}", format.extension()))
        })?;
        debug!(bytes = buffer.len(), "Image encoded");
        Ok(buffer)
    }

    /// Encode and write to `path`.
    pub fn save_as(&self, path: impl AsRef<Path>, format: ImageFormat, quality: u8) -> Result<()> {
        let bytes = self.encode(format, quality)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!(path = %path.as_ref().display(), bytes = bytes.len(), "Image saved");
        Ok(())
    }
}
