// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for Scanwerk.
//
// `ScanwerkError` is what collaborators (image codecs, bridges, config files)
// return. `WorkflowError` is the contract handed to the host application: a
// kind from a closed taxonomy plus an optional human-readable cause.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Low-level error type for operations performed by collaborators.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Image errors --
    #[error("image decoding failed: {0}")]
    ImageDecode(String),

    #[error("image encoding failed: {0}")]
    ImageEncode(String),

    #[error("compression failed: {0}")]
    Compression(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;

/// Closed taxonomy of errors surfaced to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Camera permission refused; the prompt may be shown again.
    CameraPermissionSoftDenied,
    /// Camera permission refused with "don't ask again".
    CameraPermissionHardDenied,
    /// Storage permission refused; the prompt may be shown again.
    StoragePermissionSoftDenied,
    /// Storage permission refused with "don't ask again".
    StoragePermissionHardDenied,
    /// Gallery import was requested but is switched off in the settings.
    ImportDisabled,
    /// The picked reference could not be turned into a local path.
    ImportResolutionFailed,
    /// The acquired file is not a decodable image, or no frame was captured.
    InvalidImage,
    /// Persisting or compressing the chosen candidate failed.
    CompressionFailed,
    /// Finalization was requested with every candidate slot empty.
    NoCandidateImage,
}

impl ErrorKind {
    /// Whether an error of this kind terminates the workflow.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CameraPermissionHardDenied
                | Self::StoragePermissionHardDenied
                | Self::InvalidImage
                | Self::CompressionFailed
        )
    }

    /// Stable machine-readable code, e.g. for host-side string tables.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CameraPermissionSoftDenied => "camera_permission_soft_denied",
            Self::CameraPermissionHardDenied => "camera_permission_hard_denied",
            Self::StoragePermissionSoftDenied => "storage_permission_soft_denied",
            Self::StoragePermissionHardDenied => "storage_permission_hard_denied",
            Self::ImportDisabled => "import_disabled",
            Self::ImportResolutionFailed => "import_resolution_failed",
            Self::InvalidImage => "invalid_image",
            Self::CompressionFailed => "compression_failed",
            Self::NoCandidateImage => "no_candidate_image",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error delivered to the host through the result sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowError {
    pub kind: ErrorKind,
    pub detail: Option<String>,
}

impl WorkflowError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    /// Wrap an underlying collaborator failure into a host-facing error.
    pub fn from_cause(kind: ErrorKind, cause: &ScanwerkError) -> Self {
        Self::with_detail(kind, cause.to_string())
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.kind, detail),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<ErrorKind> for WorkflowError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
