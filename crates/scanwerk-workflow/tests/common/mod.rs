// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted collaborator doubles shared by the workflow integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, Rgb, RgbImage};
use scanwerk_bridge::{
    CaptureSurface, Compressor, EditOutcome, FileResolver, GeometryEditor, ImageEnhancer,
    PermissionGate, PlatformBridge,
};
use scanwerk_core::config::WorkflowConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{CompressParams, ImageArtifact, Permission, PermissionOutcome};
use scanwerk_document::ImageCompressor;
use scanwerk_workflow::{ChannelSink, Collaborators, ScanWorkflow, SinkEvent};
use tempfile::TempDir;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

/// Write a small page image; the format follows the extension.
pub fn write_page(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_fn(48, 32, |x, y| {
        if (x + y) % 9 == 0 { Rgb([20, 20, 20]) } else { Rgb([235, 235, 225]) }
    })
    .save(&path)
    .expect("write page");
    path
}

pub fn raster() -> ImageArtifact {
    ImageArtifact::raster(DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 16, Rgb([200, 200, 190]))))
}

// -- Bridge -------------------------------------------------------------------

/// What the workflow did to the capture surface and permission gate.
#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub starts: u32,
    pub auto_capture: bool,
    pub live_detection: bool,
    pub requests: Vec<Permission>,
}

pub struct ScriptedBridge {
    /// Frame copied into the capture target; `None` yields no frame.
    pub still: Option<PathBuf>,
    /// Answers popped per request; `Granted` once exhausted.
    pub camera: VecDeque<PermissionOutcome>,
    pub storage: VecDeque<PermissionOutcome>,
    pub references: HashMap<String, PathBuf>,
    pub flash: Option<bool>,
    pub log: Arc<Mutex<SurfaceLog>>,
}

impl ScriptedBridge {
    pub fn with_still(still: Option<PathBuf>) -> Self {
        Self {
            still,
            camera: VecDeque::new(),
            storage: VecDeque::new(),
            references: HashMap::new(),
            flash: None,
            log: Arc::default(),
        }
    }
}

impl PlatformBridge for ScriptedBridge {
    fn platform_name(&self) -> &str {
        "Scripted"
    }
}

impl CaptureSurface for ScriptedBridge {
    fn start(&mut self) -> Result<()> {
        self.log.lock().expect("log").starts += 1;
        Ok(())
    }

    fn take_picture(&mut self, target: &Path) -> Result<Option<ImageArtifact>> {
        let Some(still) = &self.still else {
            return Ok(None);
        };
        std::fs::copy(still, target)?;
        Ok(Some(ImageArtifact::owned_file(target)))
    }

    fn has_flash(&self) -> bool {
        self.flash.is_some()
    }

    fn toggle_flash(&mut self) -> Result<bool> {
        let on = self.flash.ok_or(ScanwerkError::PlatformUnavailable)?;
        self.flash = Some(!on);
        Ok(!on)
    }

    fn auto_capture(&self) -> bool {
        self.log.lock().expect("log").auto_capture
    }

    fn set_auto_capture(&mut self, enabled: bool) {
        self.log.lock().expect("log").auto_capture = enabled;
    }

    fn live_detection(&self) -> bool {
        self.log.lock().expect("log").live_detection
    }

    fn set_live_detection(&mut self, enabled: bool) {
        self.log.lock().expect("log").live_detection = enabled;
    }
}

impl PermissionGate for ScriptedBridge {
    fn request(&mut self, permission: Permission) -> PermissionOutcome {
        self.log.lock().expect("log").requests.push(permission);
        let queue = match permission {
            Permission::Camera => &mut self.camera,
            Permission::StorageRead => &mut self.storage,
        };
        queue.pop_front().unwrap_or(PermissionOutcome::Granted)
    }
}

impl FileResolver for ScriptedBridge {
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        if let Some(path) = self.references.get(reference) {
            return Some(path.clone());
        }
        let path = PathBuf::from(reference);
        path.is_file().then_some(path)
    }
}

// -- Editors ------------------------------------------------------------------

/// Hands out queued outcomes; `Cancelled` once exhausted.
#[derive(Default)]
pub struct ScriptedEditor {
    pub outcomes: VecDeque<EditOutcome>,
    pub inputs: Arc<Mutex<Vec<ImageArtifact>>>,
}

impl ScriptedEditor {
    pub fn applying(artifact: ImageArtifact) -> Self {
        Self {
            outcomes: VecDeque::from([EditOutcome::Applied(artifact)]),
            ..Self::default()
        }
    }

    fn next(&mut self, input: &ImageArtifact) -> EditOutcome {
        self.inputs.lock().expect("inputs").push(input.clone());
        self.outcomes.pop_front().unwrap_or(EditOutcome::Cancelled)
    }
}

impl GeometryEditor for ScriptedEditor {
    fn apply(&mut self, input: &ImageArtifact) -> EditOutcome {
        self.next(input)
    }
}

impl ImageEnhancer for ScriptedEditor {
    fn apply(&mut self, input: &ImageArtifact) -> EditOutcome {
        self.next(input)
    }
}

// -- Compressors --------------------------------------------------------------

/// Delegates to the real compressor and records every call.
pub struct RecordingCompressor {
    inner: ImageCompressor,
    pub calls: Arc<Mutex<Vec<(PathBuf, CompressParams)>>>,
}

impl RecordingCompressor {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            inner: ImageCompressor::new(output_dir),
            calls: Arc::default(),
        }
    }
}

impl Compressor for RecordingCompressor {
    fn compress(&self, input: &Path, params: &CompressParams) -> Result<PathBuf> {
        self.calls
            .lock()
            .expect("calls")
            .push((input.to_path_buf(), *params));
        self.inner.compress(input, params)
    }
}

pub struct FailingCompressor;

impl Compressor for FailingCompressor {
    fn compress(&self, _input: &Path, _params: &CompressParams) -> Result<PathBuf> {
        Err(ScanwerkError::Compression("no space left on device".into()))
    }
}

// -- Harness ------------------------------------------------------------------

pub struct Harness {
    pub workflow: ScanWorkflow,
    pub events: UnboundedReceiver<SinkEvent>,
    pub surface: Arc<Mutex<SurfaceLog>>,
    pub calls: Arc<Mutex<Vec<(PathBuf, CompressParams)>>>,
    pub geometry_inputs: Arc<Mutex<Vec<ImageArtifact>>>,
    pub enhancer_inputs: Arc<Mutex<Vec<ImageArtifact>>>,
    pub dir: TempDir,
}

/// Collaborators before they are boxed into the workflow.
pub struct Parts {
    pub bridge: ScriptedBridge,
    pub geometry: ScriptedEditor,
    pub enhancer: ScriptedEditor,
    /// Replaces the recording compressor when set.
    pub compressor: Option<Arc<dyn Compressor>>,
}

impl Parts {
    /// Camera that captures a JPEG page; editors that back out.
    pub fn new(dir: &Path) -> Self {
        let still = write_page(dir, "still.jpg");
        Self {
            bridge: ScriptedBridge::with_still(Some(still)),
            geometry: ScriptedEditor::default(),
            enhancer: ScriptedEditor::default(),
            compressor: None,
        }
    }
}

impl Harness {
    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Next sink event, if one is waiting.
    pub fn next_event(&mut self) -> Option<SinkEvent> {
        self.events.try_recv().ok()
    }
}

pub fn launch(config: WorkflowConfig, dir: TempDir, parts: Parts) -> Harness {
    let recording = RecordingCompressor::new(&dir.path().join("out"));
    let calls = Arc::clone(&recording.calls);
    let compressor = parts.compressor.unwrap_or_else(|| Arc::new(recording));
    let surface = Arc::clone(&parts.bridge.log);
    let geometry_inputs = Arc::clone(&parts.geometry.inputs);
    let enhancer_inputs = Arc::clone(&parts.enhancer.inputs);

    let (sink, events) = ChannelSink::new();
    let workflow = ScanWorkflow::start(
        config,
        Collaborators {
            bridge: Box::new(parts.bridge),
            geometry: Box::new(parts.geometry),
            enhancer: Box::new(parts.enhancer),
            compressor,
        },
        Box::new(sink),
        dir.path().join("work"),
        Handle::current(),
    );
    Harness {
        workflow,
        events,
        surface,
        calls,
        geometry_inputs,
        enhancer_inputs,
        dir,
    }
}

/// Default configuration with a few fields overridden.
pub fn config(edit: impl FnOnce(&mut WorkflowConfig)) -> WorkflowConfig {
    let mut config = WorkflowConfig::default();
    edit(&mut config);
    config
}
