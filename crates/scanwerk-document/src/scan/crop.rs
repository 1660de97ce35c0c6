// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective crop. Maps a user-adjusted quadrilateral onto an upright
// rectangle with a projective warp.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use scanwerk_bridge::{EditOutcome, GeometryEditor};
use scanwerk_core::types::ImageArtifact;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Document outline in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_right: (f32, f32),
    pub bottom_left: (f32, f32),
}

impl Quad {
    /// The whole `width` x `height` frame.
    pub fn full(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            top_left: (0.0, 0.0),
            top_right: (w, 0.0),
            bottom_right: (w, h),
            bottom_left: (0.0, h),
        }
    }

    /// Parse `x1,y1,x2,y2,x3,y3,x4,y4` (clockwise from top-left).
    ///
    /// Non-finite coordinates are rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let values: Vec<f32> = text
            .split(',')
            .map(|part| part.trim().parse().ok().filter(|v: &f32| v.is_finite()))
            .collect::<Option<_>>()?;
        let [x1, y1, x2, y2, x3, y3, x4, y4] = values.as_slice() else {
            return None;
        };
        Some(Self {
            top_left: (*x1, *y1),
            top_right: (*x2, *y2),
            bottom_right: (*x3, *y3),
            bottom_left: (*x4, *y4),
        })
    }

    fn corners(&self) -> [(f32, f32); 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    pub fn is_finite(&self) -> bool {
        self.corners().iter().all(|(x, y)| x.is_finite() && y.is_finite())
    }

    /// Upright size: the longer of each pair of opposite edges.
    pub fn output_size(&self) -> (u32, u32) {
        let width = distance(self.top_left, self.top_right).max(distance(self.bottom_left, self.bottom_right));
        let height = distance(self.top_left, self.bottom_left).max(distance(self.top_right, self.bottom_right));
        (width.round() as u32, height.round() as u32)
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Output size for `quad` over a `width` x `height` source.
///
/// Neither side may exceed the source's longer side; larger outlines are
/// shrunk with their aspect ratio kept.
fn bounded_size(quad: &Quad, width: u32, height: u32) -> (u32, u32) {
    let (out_w, out_h) = quad.output_size();
    let limit = width.max(height).max(1);
    let longest = out_w.max(out_h);
    if longest <= limit {
        return (out_w, out_h);
    }
    let factor = limit as f64 / longest as f64;
    let shrink = |side: u32| ((side as f64 * factor).round() as u32).min(limit);
    (shrink(out_w), shrink(out_h))
}

/// Warp the region inside `quad` onto an upright rectangle no larger than
/// the source's longer side.
///
/// Returns `None` for degenerate or non-finite outlines.
#[instrument(skip(image))]
pub fn warp_quad(image: &DynamicImage, quad: &Quad) -> Option<DynamicImage> {
    if !quad.is_finite() {
        warn!("Crop outline has non-finite corners");
        return None;
    }
    let (out_w, out_h) = bounded_size(quad, image.width(), image.height());
    if out_w == 0 || out_h == 0 {
        warn!(out_w, out_h, "Degenerate crop outline");
        return None;
    }

    let dest = [
        (0.0, 0.0),
        (out_w as f32, 0.0),
        (out_w as f32, out_h as f32),
        (0.0, out_h as f32),
    ];
    let Some(projection) = Projection::from_control_points(quad.corners(), dest) else {
        warn!("Crop outline has no projective mapping");
        return None;
    };

    let mut output = RgbaImage::new(out_w, out_h);
    warp_into(
        &image.to_rgba8(),
        &projection,
        Interpolation::Bilinear,
        Rgba([255, 255, 255, 255]),
        &mut output,
    );
    debug!(out_w, out_h, "Perspective crop applied");
    Some(DynamicImage::ImageRgba8(output))
}

/// Crop step driven by a pre-set outline.
///
/// Each outline is consumed by one `apply`; with none set the step counts as
/// backed out.
#[derive(Debug, Clone, Default)]
pub struct QuadCropEditor {
    pending: Option<Quad>,
}

impl QuadCropEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quad(quad: Quad) -> Self {
        Self {
            pending: Some(quad),
        }
    }

}

impl GeometryEditor for QuadCropEditor {
    fn apply(&mut self, input: &ImageArtifact) -> EditOutcome {
        let Some(quad) = self.pending.take() else {
            debug!("No crop outline set; crop skipped");
            return EditOutcome::Cancelled;
        };
        let image = match input.load() {
            Ok(image) => image,
            Err(err) => {
                warn!(error = %err, "Crop input unreadable; leaving image unchanged");
                return EditOutcome::Cancelled;
            }
        };
        match warp_quad(&image, &quad) {
            Some(cropped) => {
                info!(width = cropped.width(), height = cropped.height(), "Crop applied");
                EditOutcome::Applied(ImageArtifact::raster(cropped))
            }
            None => EditOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn framed_page() -> DynamicImage {
        let mut img = GrayImage::from_pixel(100, 100, Luma([30u8]));
        for y in 20..80 {
            for x in 10..90 {
                img.put_pixel(x, y, Luma([240u8]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn parse_reads_eight_numbers() {
        let quad = Quad::parse("10,20, 90,20, 90,80, 10,80").expect("quad");
        assert_eq!(quad.top_right, (90.0, 20.0));
        assert_eq!(quad.output_size(), (80, 60));
        assert!(Quad::parse("1,2,3").is_none());
        assert!(Quad::parse("a,b,c,d,e,f,g,h").is_none());
    }

    #[test]
    fn warp_extracts_the_page() {
        let quad = Quad::parse("10,20,90,20,90,80,10,80").expect("quad");
        let out = warp_quad(&framed_page(), &quad).expect("warp").to_luma8();
        assert_eq!(out.dimensions(), (80, 60));
        assert!(out.get_pixel(40, 30).0[0] > 200);
    }

    #[test]
    fn oversized_outline_is_bounded_by_the_source() {
        let small = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([200u8])));
        let quad = Quad::parse("0,0,100000,0,100000,50000,0,50000").expect("quad");
        let out = warp_quad(&small, &quad).expect("warp");
        assert_eq!((out.width(), out.height()), (40, 20));
    }

    #[test]
    fn non_finite_corners_are_rejected() {
        assert!(Quad::parse("0,0,inf,0,inf,inf,0,inf").is_none());
        assert!(Quad::parse("0,0,NaN,0,10,10,0,10").is_none());

        let mut quad = Quad::full(100, 100);
        quad.bottom_right = (f32::INFINITY, 100.0);
        assert!(warp_quad(&framed_page(), &quad).is_none());
    }

    #[test]
    fn collapsed_outline_is_rejected() {
        let point = Quad {
            top_left: (5.0, 5.0),
            top_right: (5.0, 5.0),
            bottom_right: (5.0, 5.0),
            bottom_left: (5.0, 5.0),
        };
        assert!(warp_quad(&framed_page(), &point).is_none());
    }

    #[test]
    fn editor_without_outline_cancels() {
        let mut editor = QuadCropEditor::new();
        let outcome = editor.apply(&ImageArtifact::raster(framed_page()));
        assert!(matches!(outcome, EditOutcome::Cancelled));
    }

    #[test]
    fn outline_is_used_once() {
        let mut editor = QuadCropEditor::with_quad(Quad::full(100, 100));
        let input = ImageArtifact::raster(framed_page());
        assert!(matches!(editor.apply(&input), EditOutcome::Applied(_)));
        assert!(matches!(editor.apply(&input), EditOutcome::Cancelled));
    }
}
