// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable rendering of workflow errors.
//
// Hosts receive a `WorkflowError` with a kind and an optional technical
// detail. This module turns it into plain language with a suggestion, so a
// host can show a dialog without knowing the taxonomy.

use crate::error::{ErrorKind, WorkflowError};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The same step can simply be tried again.
    Retry,
    /// The user must change something first (system settings, another file).
    ActionRequired,
    /// The scan cannot continue; the workflow has ended.
    Fatal,
}

/// A human-readable error with plain message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the user may retry the same stage.
    pub retriable: bool,
    /// Drives icon and colour in the host UI.
    pub severity: Severity,
}

/// Convert a `WorkflowError` into a `HumanError`.
pub fn humanize_error(err: &WorkflowError) -> HumanError {
    let mut human = match err.kind {
        ErrorKind::CameraPermissionSoftDenied => HumanError {
            message: "The camera is needed to scan a document.".into(),
            suggestion: "Allow camera access when asked, or import a photo from your gallery instead.".into(),
            retriable: true,
            severity: Severity::Retry,
        },

        ErrorKind::CameraPermissionHardDenied => HumanError {
            message: "Camera access has been turned off for this app.".into(),
            suggestion: "Open the system settings, allow camera access, then start the scan again.".into(),
            retriable: false,
            severity: Severity::Fatal,
        },

        ErrorKind::StoragePermissionSoftDenied => HumanError {
            message: "Access to your photos is needed to import an image.".into(),
            suggestion: "Allow photo access when asked, or take a picture with the camera instead.".into(),
            retriable: true,
            severity: Severity::Retry,
        },

        ErrorKind::StoragePermissionHardDenied => HumanError {
            message: "Photo access has been turned off for this app.".into(),
            suggestion: "Open the system settings, allow storage access, then start the scan again.".into(),
            retriable: false,
            severity: Severity::Fatal,
        },

        ErrorKind::ImportDisabled => HumanError {
            message: "Importing from the gallery is switched off.".into(),
            suggestion: "Take a picture of the document with the camera instead.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ErrorKind::ImportResolutionFailed => HumanError {
            message: "We couldn't open the picture you picked.".into(),
            suggestion: "It may be stored online only. Download it to your device first, or pick another picture.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        ErrorKind::InvalidImage => HumanError {
            message: "That picture couldn't be read.".into(),
            suggestion: "The file may be damaged or not an image. Start again with a different picture.".into(),
            retriable: false,
            severity: Severity::Fatal,
        },

        ErrorKind::CompressionFailed => HumanError {
            message: "The scan couldn't be saved.".into(),
            suggestion: "Your device may be low on storage. Free up some space and scan again.".into(),
            retriable: false,
            severity: Severity::Fatal,
        },

        ErrorKind::NoCandidateImage => HumanError {
            message: "There is no picture to save yet.".into(),
            suggestion: "Take or import a picture first.".into(),
            retriable: true,
            severity: Severity::Retry,
        },
    };

    if let Some(detail) = &err.detail {
        human.suggestion = format!("{} (Detail: {detail})", human.suggestion);
    }
    human
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_denial_is_fatal() {
        let human = humanize_error(&WorkflowError::new(ErrorKind::CameraPermissionHardDenied));
        assert_eq!(human.severity, Severity::Fatal);
        assert!(!human.retriable);
    }

    #[test]
    fn soft_denial_is_retriable() {
        let human = humanize_error(&WorkflowError::new(ErrorKind::StoragePermissionSoftDenied));
        assert_eq!(human.severity, Severity::Retry);
        assert!(human.retriable);
    }

    #[test]
    fn fatal_severity_matches_kind_policy() {
        let kinds = [
            ErrorKind::CameraPermissionSoftDenied,
            ErrorKind::CameraPermissionHardDenied,
            ErrorKind::StoragePermissionSoftDenied,
            ErrorKind::StoragePermissionHardDenied,
            ErrorKind::ImportDisabled,
            ErrorKind::ImportResolutionFailed,
            ErrorKind::InvalidImage,
            ErrorKind::CompressionFailed,
            ErrorKind::NoCandidateImage,
        ];
        for kind in kinds {
            let human = humanize_error(&WorkflowError::new(kind));
            assert_eq!(human.severity == Severity::Fatal, kind.is_fatal(), "{kind}");
        }
    }

    #[test]
    fn detail_is_appended() {
        let err = WorkflowError::with_detail(ErrorKind::CompressionFailed, "No space left on device");
        let human = humanize_error(&err);
        assert!(human.suggestion.ends_with("(Detail: No space left on device)"));
    }
}
