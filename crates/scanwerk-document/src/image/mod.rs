// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: codecs, scaling, and output compression.

pub mod compress;
pub mod processor;

pub use compress::ImageCompressor;
pub use processor::ImageProcessor;
