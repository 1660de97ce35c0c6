// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Acquisition paths: camera capture and gallery import. Both check the
// relevant permission first and hand back an artifact that is known to decode.

use std::path::Path;

use scanwerk_bridge::PlatformBridge;
use scanwerk_core::error::{ErrorKind, WorkflowError};
use scanwerk_core::types::{ImageArtifact, Permission, PermissionOutcome};
use tracing::{debug, instrument, warn};

/// Capture a frame into `target`.
#[instrument(skip_all, fields(target = %target.display()))]
pub(crate) fn capture(
    bridge: &mut dyn PlatformBridge,
    target: &Path,
) -> Result<ImageArtifact, WorkflowError> {
    require(bridge, Permission::Camera)?;

    let frame = bridge
        .take_picture(target)
        .map_err(|err| WorkflowError::from_cause(ErrorKind::InvalidImage, &err))?;
    let artifact = frame.ok_or_else(|| {
        WorkflowError::with_detail(ErrorKind::InvalidImage, "capture produced no usable frame")
    })?;
    verify_decodable(&artifact)?;
    Ok(artifact)
}

/// Resolve a picker reference into a caller-owned artifact.
#[instrument(skip(bridge))]
pub(crate) fn import(
    bridge: &mut dyn PlatformBridge,
    reference: &str,
) -> Result<ImageArtifact, WorkflowError> {
    require(bridge, Permission::StorageRead)?;

    let path = bridge.resolve(reference).ok_or_else(|| {
        WorkflowError::with_detail(
            ErrorKind::ImportResolutionFailed,
            format!("cannot resolve {reference} to a local file"),
        )
    })?;
    let artifact = ImageArtifact::caller_file(path);
    verify_decodable(&artifact)?;
    Ok(artifact)
}

fn require(bridge: &mut dyn PlatformBridge, permission: Permission) -> Result<(), WorkflowError> {
    let outcome = bridge.request(permission);
    debug!(?permission, ?outcome, "Permission answered");
    let kind = match (permission, outcome) {
        (_, PermissionOutcome::Granted) => return Ok(()),
        (Permission::Camera, PermissionOutcome::SoftDenied) => ErrorKind::CameraPermissionSoftDenied,
        (Permission::Camera, PermissionOutcome::HardDenied) => ErrorKind::CameraPermissionHardDenied,
        (Permission::StorageRead, PermissionOutcome::SoftDenied) => {
            ErrorKind::StoragePermissionSoftDenied
        }
        (Permission::StorageRead, PermissionOutcome::HardDenied) => {
            ErrorKind::StoragePermissionHardDenied
        }
    };
    Err(WorkflowError::new(kind))
}

/// Read just the header; a file that fails here would fail every later stage.
fn verify_decodable(artifact: &ImageArtifact) -> Result<(), WorkflowError> {
    let Some(path) = artifact.path() else {
        return Ok(());
    };
    match image::image_dimensions(path) {
        Ok((width, height)) if width > 0 && height > 0 => Ok(()),
        Ok(_) => Err(WorkflowError::with_detail(
            ErrorKind::InvalidImage,
            format!("{} has no pixels", path.display()),
        )),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Acquired file does not decode");
            Err(WorkflowError::with_detail(
                ErrorKind::InvalidImage,
                format!("{}: {err}", path.display()),
            ))
        }
    }
}
