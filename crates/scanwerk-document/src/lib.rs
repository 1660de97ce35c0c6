// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document: Image handling for the Scanwerk scan workflow.
//
// Provides encoding and size-bounded compression to the output formats, the
// perspective crop editor, and the scan enhancement filters.

pub mod image;
pub mod scan;

pub use self::image::compress::ImageCompressor;
pub use self::image::processor::ImageProcessor;
pub use self::scan::crop::{Quad, QuadCropEditor, warp_quad};
pub use self::scan::enhance::{MagicEnhancer, MagicFilter, ScanEnhancer};
