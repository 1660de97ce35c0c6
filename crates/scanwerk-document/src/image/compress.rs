// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output compression. Re-encodes the chosen candidate in the configured format
// and, when a size limit is set, steps quality down and then dimensions until
// the encoded bytes fit.

use std::path::{Path, PathBuf};

use scanwerk_bridge::Compressor;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{CompressParams, is_same_file};
use tracing::{debug, info, instrument, warn};

use super::processor::ImageProcessor;

/// Passes before giving up on a size limit.
pub const MAX_ITERATIONS: u32 = 10;
/// JPEG quality drop per pass.
pub const QUALITY_STEP: u8 = 10;
/// Dimension factor per pass once quality can drop no further.
pub const SCALE_STEP: f32 = 0.8;

/// Compressor writing `<output_dir>/<input stem>.<ext>`.
///
/// When that name is the input file itself, `<input stem>-scan.<ext>` is
/// written instead; the input is never overwritten.
#[derive(Debug, Clone)]
pub struct ImageCompressor {
    output_dir: PathBuf,
}

impl ImageCompressor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Encode `processor` under `params`, shrinking toward `params.max_size`.
    ///
    /// The size limit is best effort: after [`MAX_ITERATIONS`] passes the
    /// smallest encoding reached is returned even if it is still too large.
    #[instrument(skip(processor), fields(width = processor.width(), height = processor.height()))]
    pub fn fit(processor: ImageProcessor, params: &CompressParams) -> Result<Vec<u8>> {
        let format = params.format;
        let mut quality = params.quality.clamp(1, 100);
        let mut encoded = processor.encode(format, quality)?;

        let Some(limit) = params.max_size else {
            return Ok(encoded);
        };

        let mut current = processor;
        for pass in 0..MAX_ITERATIONS {
            if encoded.len() as u64 <= limit {
                break;
            }
            if format.is_lossy() && quality > QUALITY_STEP {
                quality -= QUALITY_STEP;
            } else if current.width() > 1 || current.height() > 1 {
                current = current.scale(SCALE_STEP);
            } else {
                break;
            }
            encoded = current.encode(format, quality)?;
            debug!(pass, quality, bytes = encoded.len(), limit, "Compression pass");
        }

        if encoded.len() as u64 > limit {
            warn!(bytes = encoded.len(), limit, "Size limit not reached; keeping smallest encoding");
        }
        Ok(encoded)
    }
}

impl Compressor for ImageCompressor {
    #[instrument(skip(self, params), fields(input = %input.display()))]
    fn compress(&self, input: &Path, params: &CompressParams) -> Result<PathBuf> {
        let processor = ImageProcessor::open(input)?;
        let bytes = Self::fit(processor, params)?;

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                ScanwerkError::Compression(format!("input has no file name: {}", input.display()))
            })?;
        std::fs::create_dir_all(&self.output_dir)?;
        let ext = params.format.extension();
        let mut output = self.output_dir.join(format!("{stem}.{ext}"));
        if is_same_file(&output, input) {
            output = self.output_dir.join(format!("{stem}-scan.{ext}"));
            debug!(output = %output.display(), "Output name taken by the input; renamed");
        }
        std::fs::write(&output, &bytes)?;

        info!(output = %output.display(), bytes = bytes.len(), "Compressed output written");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use scanwerk_core::types::ImageFormat;

    fn noisy(width: u32, height: u32) -> ImageProcessor {
        let mut seed = 0x2545_f491_u32;
        ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_fn(
            width,
            height,
            |_, _| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                let [r, g, b, _] = seed.to_le_bytes();
                Rgb([r, g, b])
            },
        )))
    }

    fn params(format: ImageFormat, quality: u8, max_size: Option<u64>) -> CompressParams {
        CompressParams {
            quality,
            format,
            max_size,
        }
    }

    #[test]
    fn no_limit_is_a_single_encode() {
        let processor = noisy(64, 64);
        let direct = processor.encode(ImageFormat::Jpeg, 70).expect("encode");
        let fitted = ImageCompressor::fit(processor, &params(ImageFormat::Jpeg, 70, None))
            .expect("fit");
        assert_eq!(direct, fitted);
    }

    #[test]
    fn size_limit_shrinks_jpeg() {
        let unbounded = ImageCompressor::fit(noisy(200, 200), &params(ImageFormat::Jpeg, 100, None))
            .expect("fit");
        let limit = unbounded.len() as u64 / 4;
        let bounded = ImageCompressor::fit(
            noisy(200, 200),
            &params(ImageFormat::Jpeg, 100, Some(limit)),
        )
        .expect("fit");
        assert!(bounded.len() < unbounded.len());
    }

    #[test]
    fn lossless_formats_shrink_by_scaling() {
        let unbounded = ImageCompressor::fit(noisy(120, 120), &params(ImageFormat::Png, 100, None))
            .expect("fit");
        let limit = unbounded.len() as u64 / 3;
        let bounded = ImageCompressor::fit(
            noisy(120, 120),
            &params(ImageFormat::Png, 100, Some(limit)),
        )
        .expect("fit");
        let decoded = image::load_from_memory(&bounded).expect("decode");
        assert!(decoded.width() < 120);
    }

    #[test]
    fn compress_writes_stem_with_target_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("cropped.png");
        noisy(32, 24)
            .save_as(&input, ImageFormat::Png, 100)
            .expect("save");

        let out_dir = dir.path().join("out");
        let compressor = ImageCompressor::new(&out_dir);
        let output = compressor
            .compress(&input, &params(ImageFormat::Webp, 80, None))
            .expect("compress");

        assert_eq!(output, out_dir.join("cropped.webp"));
        let bytes = std::fs::read(&output).expect("read");
        assert_eq!(
            image::guess_format(&bytes).expect("guess"),
            image::ImageFormat::WebP
        );
    }

    #[test]
    fn input_in_output_dir_is_not_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("receipt.jpg");
        noisy(40, 30)
            .save_as(&input, ImageFormat::Jpeg, 95)
            .expect("save");
        let before = std::fs::read(&input).expect("read");

        let compressor = ImageCompressor::new(dir.path());
        let output = compressor
            .compress(&input, &params(ImageFormat::Jpeg, 5, None))
            .expect("compress");

        assert_eq!(output, dir.path().join("receipt-scan.jpg"));
        assert_eq!(std::fs::read(&input).expect("read"), before);
        assert_ne!(std::fs::read(&output).expect("read"), before);
    }

    #[test]
    fn unreadable_input_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("original.jpg");
        std::fs::write(&input, b"not a jpeg").expect("write");
        let compressor = ImageCompressor::new(dir.path());
        assert!(compressor
            .compress(&input, &params(ImageFormat::Jpeg, 80, None))
            .is_err());
    }
}
