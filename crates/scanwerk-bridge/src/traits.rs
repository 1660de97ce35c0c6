// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the collaborators the scan workflow
// drives: capture surface, permission prompts, file-reference resolution,
// crop/enhance editors, and the compression transform.

use std::path::{Path, PathBuf};

use scanwerk_core::error::Result;
use scanwerk_core::types::{CompressParams, ImageArtifact, Permission, PermissionOutcome};

/// Unified bridge that groups the device capabilities used during acquisition.
pub trait PlatformBridge: CaptureSurface + PermissionGate + FileResolver {
    /// Human-readable platform name (e.g. "Android 14", "Desktop").
    fn platform_name(&self) -> &str;
}

/// Live camera surface that produces still captures.
pub trait CaptureSurface {
    /// Open the camera and begin streaming preview frames.
    fn start(&mut self) -> Result<()>;

    /// Capture the current frame into `target`.
    ///
    /// Returns `Ok(None)` when the surface produced no usable frame.
    fn take_picture(&mut self, target: &Path) -> Result<Option<ImageArtifact>>;

    /// Whether the device has a controllable torch.
    fn has_flash(&self) -> bool;

    /// Flip the torch and return its new state.
    fn toggle_flash(&mut self) -> Result<bool>;

    fn auto_capture(&self) -> bool;

    /// Capture automatically once a stable document outline is detected.
    fn set_auto_capture(&mut self, enabled: bool);

    fn live_detection(&self) -> bool;

    /// Draw detected document edges over the preview.
    fn set_live_detection(&mut self, enabled: bool);
}

/// Runtime permission prompts.
///
/// Calls block the interactive flow until the user answers; the workflow never
/// has more than one request outstanding.
pub trait PermissionGate {
    fn request(&mut self, permission: Permission) -> PermissionOutcome;
}

/// Turns an opaque picker reference (content URI, bookmark, path) into a
/// readable local path.
pub trait FileResolver {
    /// Returns `None` if the reference cannot be mapped to a local file.
    fn resolve(&self, reference: &str) -> Option<PathBuf>;
}

/// Result of a user-driven editing step.
#[derive(Debug, Clone)]
pub enum EditOutcome {
    /// The user accepted an edited image.
    Applied(ImageArtifact),
    /// The user backed out; the input stays as it was.
    Cancelled,
}

/// Crop / perspective adjustment UI.
pub trait GeometryEditor {
    fn apply(&mut self, input: &ImageArtifact) -> EditOutcome;
}

/// Filter / enhancement UI.
pub trait ImageEnhancer {
    fn apply(&mut self, input: &ImageArtifact) -> EditOutcome;
}

/// Compression transform used by finalization.
///
/// Runs on a background thread and may be slow; implementations must be
/// shareable across threads.
pub trait Compressor: Send + Sync {
    /// Compress the image at `input` and return the path of the new file.
    fn compress(&self, input: &Path, params: &CompressParams) -> Result<PathBuf>;
}
