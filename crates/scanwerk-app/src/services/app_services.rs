// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: owns the persisted settings, wires the desktop
// collaborators into a scan workflow, and drives one run to its result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scanwerk_bridge::{DesktopBridge, PlatformBridge, platform_bridge};
use scanwerk_core::config::{ConfigProvider, JsonFileConfig, SettingsMap, WorkflowConfig, keys};
use scanwerk_core::error::{ErrorKind, Result, ScanwerkError, WorkflowError};
use scanwerk_core::types::{ScanResult, Stage};
use scanwerk_document::{ImageCompressor, MagicEnhancer, MagicFilter, Quad, QuadCropEditor};
use scanwerk_workflow::{ChannelSink, Collaborators, ScanWorkflow, SinkEvent};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::data_dir;

/// Where the page comes from.
#[derive(Debug, Clone)]
pub enum Source {
    /// Treat this still image as the camera frame.
    Capture(PathBuf),
    /// Gallery-style reference (path or `file://` URI).
    Import(String),
}

/// One scan as requested on the command line.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub source: Source,
    /// Crop outline; without one the crop step is skipped.
    pub corners: Option<Quad>,
    /// Enhancement filter; requires the crop stage.
    pub filter: Option<MagicFilter>,
    pub work_dir: PathBuf,
    pub out_dir: PathBuf,
}

/// Shared application services.
#[derive(Debug, Clone)]
pub struct AppServices {
    settings: JsonFileConfig,
}

impl AppServices {
    /// Services backed by the settings file in the data directory.
    pub fn init() -> Self {
        Self::with_settings_file(data_dir::settings_path())
    }

    pub fn with_settings_file(path: impl Into<PathBuf>) -> Self {
        Self {
            settings: JsonFileConfig::new(path),
        }
    }

    pub fn settings_path(&self) -> &Path {
        self.settings.path()
    }

    pub fn load_config(&self) -> WorkflowConfig {
        self.settings.load()
    }

    pub fn persist_config(&self, config: &WorkflowConfig) -> Result<()> {
        self.settings.save(config)?;
        info!(path = %self.settings.path().display(), "settings saved");
        Ok(())
    }

    /// Update one persisted key. `raw` is parsed as JSON, else taken as a string.
    pub fn set_setting(&self, key: &str, raw: &str) -> Result<WorkflowConfig> {
        if !keys::ALL.contains(&key) {
            return Err(ScanwerkError::Config(format!(
                "unknown setting {key}; expected one of {}",
                keys::ALL.join(", ")
            )));
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
        let mut settings = SettingsMap::from_config(&self.load_config());
        settings.set(key, value);
        let config = settings.load();
        self.persist_config(&config)?;
        Ok(config)
    }

    /// Run one scan to completion under `config`.
    pub async fn run_scan(
        &self,
        config: WorkflowConfig,
        request: ScanRequest,
    ) -> std::result::Result<ScanResult, WorkflowError> {
        if request.filter.is_some() && !config.crop_enabled {
            warn!("enhancement runs after cropping; filter ignored with the crop stage disabled");
        }

        let bridge: Box<dyn PlatformBridge> = match &request.source {
            Source::Capture(still) => Box::new(DesktopBridge::with_still_frame(still)),
            Source::Import(_) => platform_bridge(),
        };
        let geometry = match request.corners {
            Some(quad) => QuadCropEditor::with_quad(quad),
            None => QuadCropEditor::new(),
        };
        let collaborators = Collaborators {
            bridge,
            geometry: Box::new(geometry),
            enhancer: Box::new(MagicEnhancer::new(request.filter.unwrap_or_default())),
            compressor: Arc::new(ImageCompressor::new(&request.out_dir)),
        };

        let (sink, mut events) = ChannelSink::new();
        let mut workflow = ScanWorkflow::start(
            config,
            collaborators,
            Box::new(sink),
            &request.work_dir,
            Handle::current(),
        );

        match &request.source {
            Source::Capture(_) => workflow.capture(),
            Source::Import(reference) => workflow.import(reference),
        };
        if workflow.stage() == Stage::Cropping {
            if request.filter.is_some() {
                workflow.request_enhancement();
            }
            workflow.crop();
        }
        if workflow.stage() == Stage::Enhancing {
            workflow.enhance();
            workflow.confirm();
        }
        workflow.wait_finalization().await;

        // A retriable error leaves the run in acquisition; one-shot runs stop there.
        if !workflow.stage().is_terminal() {
            workflow.cancel();
        }

        let mut last_error = None;
        while let Ok(event) = events.try_recv() {
            match event {
                SinkEvent::Success(result) => return Ok(result),
                SinkEvent::Error(err) => last_error = Some(err),
                SinkEvent::Closed => {}
            }
        }
        Err(last_error.unwrap_or_else(|| {
            WorkflowError::with_detail(ErrorKind::NoCandidateImage, "scan closed without a result")
        }))
    }
}
