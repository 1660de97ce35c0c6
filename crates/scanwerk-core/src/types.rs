// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scan workflow.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, ScanwerkError};

/// Unique identifier for one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Epoch counter stamped on stage-completion events.
///
/// Bumped on every stage transition; an event carrying an older value was
/// issued for a stage that is no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Output encodings supported by finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// File extension written for this format (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// Infer the format from a file extension. Unknown extensions yield `None`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Whether the encoder honours a quality setting.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    /// The matching `image` crate format.
    pub fn codec(&self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Webp => image::ImageFormat::WebP,
        }
    }
}

/// Who is responsible for deleting a path-backed artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    /// Created by the workflow (camera capture, persisted temp files).
    Workflow,
    /// Belongs to the caller (gallery picks); never deleted by the workflow.
    Caller,
}

/// An image threaded through the workflow stages.
#[derive(Debug, Clone)]
pub enum ImageArtifact {
    /// Encoded image bytes on persistent storage.
    File { path: PathBuf, ownership: Ownership },
    /// Decoded raster held in memory. Shared so the finalization task can
    /// read it while the orchestrator still holds the slot.
    Raster(Arc<DynamicImage>),
}

impl ImageArtifact {
    pub fn owned_file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            ownership: Ownership::Workflow,
        }
    }

    pub fn caller_file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            ownership: Ownership::Caller,
        }
    }

    pub fn raster(image: DynamicImage) -> Self {
        Self::Raster(Arc::new(image))
    }

    /// Backing path, if the artifact lives on storage.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Raster(_) => None,
        }
    }

    pub fn is_memory_backed(&self) -> bool {
        matches!(self, Self::Raster(_))
    }

    /// Path of a file the workflow is allowed to delete.
    pub fn owned_path(&self) -> Option<&Path> {
        match self {
            Self::File {
                path,
                ownership: Ownership::Workflow,
            } => Some(path),
            _ => None,
        }
    }

    /// Decode (or clone) the pixels, for collaborators that transform them.
    pub fn load(&self) -> Result<DynamicImage> {
        match self {
            Self::File { path, .. } => open_oriented(path),
            Self::Raster(image) => Ok(image.as_ref().clone()),
        }
    }
}

/// Which candidate slot an artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateKind {
    Original,
    Cropped,
    Transformed,
}

impl CandidateKind {
    /// Finalization preference, highest first.
    pub const PRIORITY: [CandidateKind; 3] = [Self::Transformed, Self::Cropped, Self::Original];

    /// Fixed temp-file stem used when persisting a raster of this kind.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Cropped => "cropped",
            Self::Transformed => "transformed",
        }
    }

    /// `<stem>.<ext>` for the given output format.
    pub fn file_name(&self, format: ImageFormat) -> String {
        format!("{}.{}", self.file_stem(), format.extension())
    }
}

/// Workflow stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Acquiring,
    Cropping,
    Enhancing,
    Finalizing,
    Done,
    Failed,
    Cancelled,
}

impl Stage {
    /// No transitions leave a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Stages driven directly by user input on the interactive thread.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Cropping | Self::Enhancing)
    }
}

/// Runtime permissions the acquisition paths depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Camera,
    StorageRead,
}

/// Answer to a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionOutcome {
    Granted,
    /// Refused, but the prompt may be shown again.
    SoftDenied,
    /// Refused with "don't ask again"; only the system settings can undo it.
    HardDenied,
}

/// Parameters handed to the compression transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressParams {
    pub quality: u8,
    pub format: ImageFormat,
    /// Upper bound on the encoded size in bytes. `None` means unconstrained.
    pub max_size: Option<u64>,
}

/// The single artifact handed to the host on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub run_id: RunId,
    pub output_file: PathBuf,
    /// Slot the output was produced from.
    pub candidate: CandidateKind,
    /// Size of the output file in bytes.
    pub bytes: u64,
    pub completed_at: DateTime<Utc>,
}

/// Decode the file at `path` upright, applying its EXIF orientation.
///
/// The format is sniffed from the content rather than the extension.
pub fn open_oriented(path: &Path) -> Result<DynamicImage> {
    let decode_err =
        |err: image::ImageError| ScanwerkError::ImageDecode(format!("{}: {err}", path.display()));
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(decode_err)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    if orientation != Orientation::NoTransforms {
        debug!(path = %path.display(), ?orientation, "Applying EXIF orientation");
        image.apply_orientation(orientation);
    }
    Ok(image)
}

/// Whether `a` and `b` name the same file, following links where both exist.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
