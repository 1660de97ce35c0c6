// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop/CI bridge.
//
// There are no runtime permission prompts off-device, picker references are
// plain paths or `file://` URIs, and the "camera" re-encodes a configured
// still image so the capture path can be exercised headless.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{ImageArtifact, Permission, PermissionOutcome, open_oriented};
use tracing::{debug, info, warn};

use crate::traits::*;

/// Bridge used on non-mobile platforms.
#[derive(Debug, Default)]
pub struct DesktopBridge {
    /// Image returned by every capture, if any.
    still_frame: Option<PathBuf>,
    started: bool,
    auto_capture: bool,
    live_detection: bool,
}

impl DesktopBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `path` as the frame produced by `take_picture`.
    pub fn with_still_frame(path: impl Into<PathBuf>) -> Self {
        Self {
            still_frame: Some(path.into()),
            ..Self::default()
        }
    }
}

impl PlatformBridge for DesktopBridge {
    fn platform_name(&self) -> &str {
        "Desktop"
    }
}

impl CaptureSurface for DesktopBridge {
    fn start(&mut self) -> Result<()> {
        debug!(still = ?self.still_frame, "desktop capture surface started");
        self.started = true;
        Ok(())
    }

    fn take_picture(&mut self, target: &Path) -> Result<Option<ImageArtifact>> {
        if !self.started {
            return Err(ScanwerkError::Bridge("capture surface not started".into()));
        }
        let Some(still) = &self.still_frame else {
            warn!("no still frame configured; nothing captured");
            return Ok(None);
        };
        // Re-encode upright so the file's contents match the target extension.
        let frame = open_oriented(still)?;
        DynamicImage::ImageRgb8(frame.to_rgb8())
            .save(target)
            .map_err(|err| ScanwerkError::ImageEncode(format!("{}: {err}", target.display())))?;
        info!(target = %target.display(), "still frame captured");
        Ok(Some(ImageArtifact::owned_file(target)))
    }

    fn has_flash(&self) -> bool {
        false
    }

    fn toggle_flash(&mut self) -> Result<bool> {
        Err(ScanwerkError::PlatformUnavailable)
    }

    fn auto_capture(&self) -> bool {
        self.auto_capture
    }

    fn set_auto_capture(&mut self, enabled: bool) {
        self.auto_capture = enabled;
    }

    fn live_detection(&self) -> bool {
        self.live_detection
    }

    fn set_live_detection(&mut self, enabled: bool) {
        self.live_detection = enabled;
    }
}

impl PermissionGate for DesktopBridge {
    fn request(&mut self, permission: Permission) -> PermissionOutcome {
        debug!(?permission, "desktop grants every permission");
        PermissionOutcome::Granted
    }
}

impl FileResolver for DesktopBridge {
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let raw = reference.strip_prefix("file://").unwrap_or(reference);
        let path = Path::new(raw);
        if path.is_file() {
            Some(path.to_path_buf())
        } else {
            debug!(reference, "reference does not name a local file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_plain_paths_and_file_uris() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("page.png");
        std::fs::write(&file, b"not really a png").expect("write");

        let bridge = DesktopBridge::new();
        assert_eq!(bridge.resolve(file.to_str().expect("utf8")), Some(file.clone()));
        let uri = format!("file://{}", file.display());
        assert_eq!(bridge.resolve(&uri), Some(file));
        assert_eq!(bridge.resolve("content://media/external/images/42"), None);
    }

    #[test]
    fn capture_requires_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut bridge = DesktopBridge::new();
        assert!(bridge.take_picture(&dir.path().join("original.jpg")).is_err());
    }

    #[test]
    fn capture_without_still_yields_no_frame() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut bridge = DesktopBridge::new();
        bridge.start().expect("start");
        let frame = bridge
            .take_picture(&dir.path().join("original.jpg"))
            .expect("capture");
        assert!(frame.is_none());
    }

    #[test]
    fn capture_reencodes_still_into_owned_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let still = dir.path().join("still.png");
        image::RgbaImage::from_pixel(12, 9, image::Rgba([250, 250, 240, 255]))
            .save(&still)
            .expect("write still");
        let target = dir.path().join("original.jpg");

        let mut bridge = DesktopBridge::with_still_frame(&still);
        bridge.start().expect("start");
        let artifact = bridge.take_picture(&target).expect("capture").expect("frame");
        assert_eq!(artifact.owned_path(), Some(target.as_path()));

        let bytes = std::fs::read(&target).expect("read");
        assert_eq!(image::guess_format(&bytes).expect("guess"), image::ImageFormat::Jpeg);
        assert_eq!(image::image_dimensions(&target).expect("decode"), (12, 9));
    }

    #[test]
    fn unreadable_still_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let still = dir.path().join("still.jpg");
        std::fs::write(&still, b"jpeg bytes").expect("write");

        let mut bridge = DesktopBridge::with_still_frame(&still);
        bridge.start().expect("start");
        assert!(bridge.take_picture(&dir.path().join("original.jpg")).is_err());
    }

    #[test]
    fn every_permission_is_granted() {
        let mut bridge = DesktopBridge::new();
        assert_eq!(bridge.request(Permission::Camera), PermissionOutcome::Granted);
        assert_eq!(bridge.request(Permission::StorageRead), PermissionOutcome::Granted);
    }
}
