// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan editing steps: perspective crop and enhancement filters.

pub mod crop;
pub mod enhance;

pub use crop::QuadCropEditor;
pub use enhance::{MagicEnhancer, ScanEnhancer};
