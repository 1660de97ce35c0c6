// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Workflow configuration.
//
// Settings live as nine flat key/value pairs. Providers read them once at
// workflow start and hand the orchestrator an immutable `WorkflowConfig`.
// Missing or mistyped values fall back to their defaults; loading never fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::ImageFormat;

/// Persisted setting keys.
pub mod keys {
    pub const IMAGE_TYPE: &str = "IMAGE_TYPE_KEY";
    pub const IMAGE_QUALITY: &str = "IMAGE_QUALITY_KEY";
    pub const IMAGE_SIZE: &str = "IMAGE_SIZE_KEY";
    pub const GALLERY_ENABLED: &str = "IS_GALLERY_ENABLED";
    pub const CROPPER_ENABLED: &str = "IS_CROPPER_ENABLED";
    pub const AUTO_CAPTURE_DEFAULT: &str = "IS_AUTO_CAPTURE_ENABLED_BY_DEFAULT";
    pub const LIVE_DETECTION: &str = "IS_LIVE_DETECTION_ENABLED";
    pub const CAPTURE_MODE_BUTTON: &str = "IS_CAPTURE_MODE_BUTTON_ENABLED";
    pub const MAGIC_BUTTON: &str = "IS_MAGIC_BUTTON_ENABLED";

    pub const ALL: [&str; 9] = [
        IMAGE_TYPE,
        IMAGE_QUALITY,
        IMAGE_SIZE,
        GALLERY_ENABLED,
        CROPPER_ENABLED,
        AUTO_CAPTURE_DEFAULT,
        LIVE_DETECTION,
        CAPTURE_MODE_BUTTON,
        MAGIC_BUTTON,
    ];
}

/// Stored in place of a size limit when none is configured.
pub const SIZE_NOT_INITIALIZED: i64 = -1;

/// Immutable settings for one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Encoding of the final output file.
    pub image_format: ImageFormat,
    /// Encoder quality, 0–100 (only lossy formats honour it).
    pub image_quality: u8,
    /// Upper bound on the output size in bytes; `None` leaves it unconstrained.
    pub max_output_size: Option<u64>,
    /// Whether images may be imported from the gallery.
    pub gallery_enabled: bool,
    /// Whether the crop stage follows acquisition.
    pub crop_enabled: bool,
    /// Initial state of automatic capture on the capture surface.
    pub auto_capture_default: bool,
    /// Initial state of live document-edge detection.
    pub live_detection_default: bool,
    /// Whether the auto/manual capture toggle is offered.
    pub capture_mode_toggle_visible: bool,
    /// Whether the magic-enhance action is offered.
    pub enhance_toggle_visible: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::Jpeg,
            image_quality: 100,
            max_output_size: None,
            gallery_enabled: true,
            crop_enabled: true,
            auto_capture_default: true,
            live_detection_default: true,
            capture_mode_toggle_visible: true,
            enhance_toggle_visible: true,
        }
    }
}

/// Read-only source of workflow settings.
pub trait ConfigProvider {
    /// Snapshot the current settings. Never fails; unusable values are
    /// replaced by defaults.
    fn load(&self) -> WorkflowConfig;
}

impl ConfigProvider for WorkflowConfig {
    fn load(&self) -> WorkflowConfig {
        self.clone()
    }
}

/// In-memory key/value settings store with type coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsMap {
    values: HashMap<String, Value>,
}

impl SettingsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Build the persisted representation of a config.
    pub fn from_config(config: &WorkflowConfig) -> Self {
        let mut map = Self::new();
        map.set(keys::IMAGE_TYPE, config.image_format.extension());
        map.set(keys::IMAGE_QUALITY, config.image_quality);
        map.set(
            keys::IMAGE_SIZE,
            config
                .max_output_size
                .and_then(|size| i64::try_from(size).ok())
                .unwrap_or(SIZE_NOT_INITIALIZED),
        );
        map.set(keys::GALLERY_ENABLED, config.gallery_enabled);
        map.set(keys::CROPPER_ENABLED, config.crop_enabled);
        map.set(keys::AUTO_CAPTURE_DEFAULT, config.auto_capture_default);
        map.set(keys::LIVE_DETECTION, config.live_detection_default);
        map.set(keys::CAPTURE_MODE_BUTTON, config.capture_mode_toggle_visible);
        map.set(keys::MAGIC_BUTTON, config.enhance_toggle_visible);
        map
    }

    /// Keep only the known keys from a JSON object.
    pub fn from_json_object(object: serde_json::Map<String, Value>) -> Self {
        let values = object
            .into_iter()
            .filter(|(key, _)| {
                let known = keys::ALL.contains(&key.as_str());
                if !known {
                    debug!(key = %key, "ignoring unknown setting");
                }
                known
            })
            .collect();
        Self { values }
    }

    pub fn to_json_object(&self) -> serde_json::Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
            None => default,
            Some(other) => {
                warn!(key, value = %other, "setting is not a boolean; using default");
                default
            }
        }
    }

    fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl ConfigProvider for SettingsMap {
    fn load(&self) -> WorkflowConfig {
        let defaults = WorkflowConfig::default();

        let image_format = match self.get(keys::IMAGE_TYPE).and_then(Value::as_str) {
            Some(ext) => match ext.to_ascii_lowercase().as_str() {
                "png" => ImageFormat::Png,
                "webp" => ImageFormat::Webp,
                _ => ImageFormat::Jpeg,
            },
            None => defaults.image_format,
        };

        let image_quality = self
            .integer(keys::IMAGE_QUALITY)
            .map(|q| q.clamp(0, 100) as u8)
            .unwrap_or(defaults.image_quality);

        let max_output_size = self
            .integer(keys::IMAGE_SIZE)
            .filter(|size| *size > 0)
            .map(|size| size as u64);

        WorkflowConfig {
            image_format,
            image_quality,
            max_output_size,
            gallery_enabled: self.bool_or(keys::GALLERY_ENABLED, defaults.gallery_enabled),
            crop_enabled: self.bool_or(keys::CROPPER_ENABLED, defaults.crop_enabled),
            auto_capture_default: self
                .bool_or(keys::AUTO_CAPTURE_DEFAULT, defaults.auto_capture_default),
            live_detection_default: self
                .bool_or(keys::LIVE_DETECTION, defaults.live_detection_default),
            capture_mode_toggle_visible: self
                .bool_or(keys::CAPTURE_MODE_BUTTON, defaults.capture_mode_toggle_visible),
            enhance_toggle_visible: self
                .bool_or(keys::MAGIC_BUTTON, defaults.enhance_toggle_visible),
        }
    }
}

/// Settings persisted as a flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw settings, or `None` if the file is absent or unreadable.
    fn read_settings(&self) -> Option<SettingsMap> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file; using defaults");
                return None;
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cannot read settings file");
                return None;
            }
        };
        match serde_json::from_str::<serde_json::Map<String, Value>>(&data) {
            Ok(object) => Some(SettingsMap::from_json_object(object)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "malformed settings file; using defaults");
                None
            }
        }
    }

    /// Persist `config` in the flat key/value layout.
    pub fn save(&self, config: &WorkflowConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&SettingsMap::from_config(config).to_json_object())?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl ConfigProvider for JsonFileConfig {
    fn load(&self) -> WorkflowConfig {
        self.read_settings()
            .map(|settings| settings.load())
            .unwrap_or_default()
    }
}
