// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan workflow orchestrator.
//
// Single-writer state machine over `WorkflowState`. Every public method runs
// on the interactive thread; the only concurrent work is the finalization
// task, whose completion comes back over a channel and is applied through
// `poll_finalization` / `wait_finalization`.
//
//   ACQUIRING ─┬─> CROPPING ─┬─> ENHANCING ─┐
//              │             └──────────────┼─> FINALIZING ─┬─> DONE
//              └────────────────────────────┘               └─> FAILED
//   any interactive stage ─> CANCELLED

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scanwerk_bridge::{Compressor, EditOutcome, GeometryEditor, ImageEnhancer, PlatformBridge};
use scanwerk_core::config::WorkflowConfig;
use scanwerk_core::error::{ErrorKind, WorkflowError};
use scanwerk_core::types::{
    CandidateKind, CompressParams, Generation, ImageArtifact, RunId, ScanResult, Stage,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::acquisition;
use crate::finalize::{self, FinalizeCompletion, FinalizeJob};
use crate::sink::ResultSink;
use crate::state::WorkflowState;

/// External collaborators driven by the workflow.
pub struct Collaborators {
    pub bridge: Box<dyn PlatformBridge>,
    pub geometry: Box<dyn GeometryEditor>,
    pub enhancer: Box<dyn ImageEnhancer>,
    pub compressor: Arc<dyn Compressor>,
}

/// What a request or event did to the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: Stage, to: Stage },
    /// Accepted (or ignored) without a stage change.
    Unchanged(Stage),
    /// Held until the in-flight finalization completes.
    Queued,
    /// Stale or out-of-stage event; nothing was touched.
    Discarded,
}

/// Requests received while finalization is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Cancel,
    Reacquire,
}

/// One scan run, from acquisition to a single result.
pub struct ScanWorkflow {
    run_id: RunId,
    config: WorkflowConfig,
    state: WorkflowState,
    collaborators: Collaborators,
    sink: Box<dyn ResultSink>,
    work_dir: PathBuf,
    runtime: Handle,
    completion_tx: mpsc::UnboundedSender<FinalizeCompletion>,
    completion_rx: mpsc::UnboundedReceiver<FinalizeCompletion>,
    deferred: VecDeque<Deferred>,
}

impl ScanWorkflow {
    /// Begin a run in ACQUIRING with `config` fixed for its lifetime.
    ///
    /// Temp files go under `work_dir`; finalization is spawned on `runtime`.
    pub fn start(
        config: WorkflowConfig,
        collaborators: Collaborators,
        sink: Box<dyn ResultSink>,
        work_dir: impl Into<PathBuf>,
        runtime: Handle,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let mut workflow = Self {
            run_id: RunId::new(),
            config,
            state: WorkflowState::new(),
            collaborators,
            sink,
            work_dir: work_dir.into(),
            runtime,
            completion_tx,
            completion_rx,
            deferred: VecDeque::new(),
        };
        info!(
            run = %workflow.run_id,
            platform = workflow.collaborators.bridge.platform_name(),
            format = ?workflow.config.image_format,
            crop = workflow.config.crop_enabled,
            "Scan workflow started"
        );
        if let Err(err) = std::fs::create_dir_all(&workflow.work_dir) {
            warn!(work_dir = %workflow.work_dir.display(), error = %err, "Cannot create work directory");
        }
        workflow.enter_acquiring();
        workflow
    }

    // -- Accessors ------------------------------------------------------------

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage()
    }

    /// Tag for events issued against the current stage.
    pub fn generation(&self) -> Generation {
        self.state.generation()
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Where the capture surface writes the original frame.
    pub fn capture_target(&self) -> PathBuf {
        self.work_dir
            .join(CandidateKind::Original.file_name(self.config.image_format))
    }

    // -- Acquisition ----------------------------------------------------------

    /// Take a picture with the capture surface.
    #[instrument(skip(self), fields(run = %self.run_id))]
    pub fn capture(&mut self) -> Transition {
        if self.stage() != Stage::Acquiring {
            debug!(stage = ?self.stage(), "Capture ignored outside acquisition");
            return Transition::Unchanged(self.stage());
        }
        let generation = self.generation();
        let target = self.capture_target();
        match acquisition::capture(self.collaborators.bridge.as_mut(), &target) {
            Ok(artifact) => self.on_acquired(generation, artifact),
            Err(err) => self.on_acquisition_failed(generation, err),
        }
    }

    /// Import a gallery pick identified by an opaque `reference`.
    #[instrument(skip(self), fields(run = %self.run_id))]
    pub fn import(&mut self, reference: &str) -> Transition {
        if self.stage() != Stage::Acquiring {
            debug!(stage = ?self.stage(), "Import ignored outside acquisition");
            return Transition::Unchanged(self.stage());
        }
        let generation = self.generation();
        if !self.config.gallery_enabled {
            return self.on_acquisition_failed(generation, WorkflowError::new(ErrorKind::ImportDisabled));
        }
        match acquisition::import(self.collaborators.bridge.as_mut(), reference) {
            Ok(artifact) => self.on_acquired(generation, artifact),
            Err(err) => self.on_acquisition_failed(generation, err),
        }
    }

    /// An acquisition issued under `generation` produced `artifact`.
    pub fn on_acquired(&mut self, generation: Generation, artifact: ImageArtifact) -> Transition {
        if !self.accepts(generation, Stage::Acquiring, "acquired") {
            return Transition::Discarded;
        }
        if let Err(err) = self.state.set_original(artifact) {
            return self.report(err);
        }
        if self.config.crop_enabled {
            self.move_to(Stage::Cropping)
        } else {
            self.begin_finalization()
        }
    }

    pub fn on_acquisition_failed(&mut self, generation: Generation, err: WorkflowError) -> Transition {
        if !self.accepts(generation, Stage::Acquiring, "acquisition failure") {
            return Transition::Discarded;
        }
        self.report(err)
    }

    // -- Capture surface controls ---------------------------------------------

    /// Flip between automatic and manual capture. Live detection follows the
    /// new mode. Returns the new auto-capture flag.
    pub fn toggle_capture_mode(&mut self) -> Option<bool> {
        if self.stage() != Stage::Acquiring || !self.config.capture_mode_toggle_visible {
            return None;
        }
        let bridge = self.collaborators.bridge.as_mut();
        let auto = !bridge.auto_capture();
        bridge.set_auto_capture(auto);
        bridge.set_live_detection(auto);
        debug!(auto, "Capture mode toggled");
        Some(auto)
    }

    /// Returns the new torch state, or `None` without a controllable torch.
    pub fn toggle_flash(&mut self) -> Option<bool> {
        if self.stage() != Stage::Acquiring || !self.collaborators.bridge.has_flash() {
            return None;
        }
        match self.collaborators.bridge.toggle_flash() {
            Ok(on) => Some(on),
            Err(err) => {
                warn!(error = %err, "Flash toggle failed");
                None
            }
        }
    }

    // -- Geometry -------------------------------------------------------------

    /// Hand the original to the geometry editor.
    pub fn crop(&mut self) -> Transition {
        if self.stage() != Stage::Cropping {
            return Transition::Unchanged(self.stage());
        }
        let Some(input) = self.state.original().cloned() else {
            return self.report(WorkflowError::new(ErrorKind::NoCandidateImage));
        };
        let generation = self.generation();
        match self.collaborators.geometry.apply(&input) {
            EditOutcome::Applied(artifact) => self.on_cropped(generation, artifact),
            EditOutcome::Cancelled => self.on_crop_skipped(generation),
        }
    }

    pub fn on_cropped(&mut self, generation: Generation, artifact: ImageArtifact) -> Transition {
        if !self.accepts(generation, Stage::Cropping, "cropped") {
            return Transition::Discarded;
        }
        if let Err(err) = self.state.set_cropped(artifact) {
            return self.report(err);
        }
        self.after_crop()
    }

    /// The user skipped or backed out of the crop; `cropped` stays unset.
    pub fn on_crop_skipped(&mut self, generation: Generation) -> Transition {
        if !self.accepts(generation, Stage::Cropping, "crop skipped") {
            return Transition::Discarded;
        }
        self.after_crop()
    }

    fn after_crop(&mut self) -> Transition {
        if self.state.enhance_requested() {
            self.move_to(Stage::Enhancing)
        } else {
            self.begin_finalization()
        }
    }

    // -- Enhancement ----------------------------------------------------------

    /// Ask for the enhancement stage after cropping.
    pub fn request_enhancement(&mut self) -> Transition {
        if self.stage() == Stage::Cropping && self.config.enhance_toggle_visible {
            self.state.request_enhancement();
            debug!("Enhancement requested");
        } else {
            debug!(stage = ?self.stage(), "Enhancement request ignored");
        }
        Transition::Unchanged(self.stage())
    }

    /// Hand the best current image to the enhancer.
    pub fn enhance(&mut self) -> Transition {
        if self.stage() != Stage::Enhancing {
            return Transition::Unchanged(self.stage());
        }
        let Some((_, input)) = self.state.select_candidate() else {
            return self.report(WorkflowError::new(ErrorKind::NoCandidateImage));
        };
        let input = input.clone();
        let generation = self.generation();
        match self.collaborators.enhancer.apply(&input) {
            EditOutcome::Applied(artifact) => self.on_enhanced(generation, artifact),
            EditOutcome::Cancelled => self.on_enhance_cancelled(generation),
        }
    }

    pub fn on_enhanced(&mut self, generation: Generation, artifact: ImageArtifact) -> Transition {
        if !self.accepts(generation, Stage::Enhancing, "enhanced") {
            return Transition::Discarded;
        }
        if let Err(err) = self.state.set_transformed(artifact) {
            return self.report(err);
        }
        self.begin_finalization()
    }

    /// The user backed out of the filter; `confirm` still finalizes.
    pub fn on_enhance_cancelled(&mut self, generation: Generation) -> Transition {
        if !self.accepts(generation, Stage::Enhancing, "enhance cancelled") {
            return Transition::Discarded;
        }
        Transition::Unchanged(Stage::Enhancing)
    }

    // -- Confirmation and finalization ----------------------------------------

    /// Finalize with the best candidate. A no-op once finalizing or done.
    #[instrument(skip(self), fields(run = %self.run_id))]
    pub fn confirm(&mut self) -> Transition {
        match self.stage() {
            Stage::Cropping | Stage::Enhancing => self.begin_finalization(),
            Stage::Acquiring => self.report(WorkflowError::new(ErrorKind::NoCandidateImage)),
            stage => {
                debug!(?stage, "Confirm ignored");
                Transition::Unchanged(stage)
            }
        }
    }

    fn begin_finalization(&mut self) -> Transition {
        let Some((kind, artifact)) = self.state.select_candidate() else {
            return self.report(WorkflowError::new(ErrorKind::NoCandidateImage));
        };
        let artifact = artifact.clone();
        let transition = self.move_to(Stage::Finalizing);

        let job = FinalizeJob {
            run_id: self.run_id,
            generation: self.generation(),
            kind,
            artifact,
            work_dir: self.work_dir.clone(),
            params: self.compress_params(),
            compressor: Arc::clone(&self.collaborators.compressor),
        };
        info!(?kind, max_size = ?job.params.max_size, "Finalization started");
        finalize::spawn(&self.runtime, job, self.completion_tx.clone());
        transition
    }

    fn compress_params(&self) -> CompressParams {
        CompressParams {
            quality: self.config.image_quality,
            format: self.config.image_format,
            max_size: self.config.max_output_size,
        }
    }

    /// Apply a finished finalization if one has arrived.
    pub fn poll_finalization(&mut self) -> Option<Transition> {
        let completion = self.completion_rx.try_recv().ok()?;
        Some(self.apply_completion(completion))
    }

    /// Wait for the in-flight finalization and apply it.
    ///
    /// Returns `None` when nothing is finalizing.
    pub async fn wait_finalization(&mut self) -> Option<Transition> {
        if self.stage() != Stage::Finalizing {
            return None;
        }
        let completion = self.completion_rx.recv().await?;
        Some(self.apply_completion(completion))
    }

    fn apply_completion(&mut self, completion: FinalizeCompletion) -> Transition {
        if !self.accepts(completion.generation, Stage::Finalizing, "finalization") {
            return Transition::Discarded;
        }
        let transition = match completion.outcome {
            Ok(result) => self.finish(result),
            Err(err) => {
                error!(error = %err, "Finalization failed");
                let transition = self.move_to(Stage::Failed);
                self.sink.on_error(err);
                self.sweep(None);
                transition
            }
        };
        for request in self.deferred.drain(..) {
            info!(?request, stage = ?self.state.stage(), "Deferred request dropped; run already ended");
        }
        transition
    }

    fn finish(&mut self, result: ScanResult) -> Transition {
        let transition = self.move_to(Stage::Done);
        let keep = result.output_file.clone();
        info!(output = %keep.display(), bytes = result.bytes, "Scan complete");
        self.sink.on_success(result);
        self.sweep(Some(keep.as_path()));
        transition
    }

    // -- Navigation -----------------------------------------------------------

    /// Abandon the run. Deferred while finalizing.
    #[instrument(skip(self), fields(run = %self.run_id))]
    pub fn cancel(&mut self) -> Transition {
        match self.stage() {
            Stage::Finalizing => self.defer(Deferred::Cancel),
            stage if stage.is_terminal() => Transition::Unchanged(stage),
            _ => {
                let transition = self.move_to(Stage::Cancelled);
                self.sink.on_close();
                self.sweep(None);
                transition
            }
        }
    }

    /// Drop every candidate and return to acquisition ("retake").
    #[instrument(skip(self), fields(run = %self.run_id))]
    pub fn reacquire(&mut self) -> Transition {
        match self.stage() {
            Stage::Finalizing => self.defer(Deferred::Reacquire),
            stage if stage.is_terminal() => Transition::Unchanged(stage),
            _ => {
                for path in self.state.clear() {
                    remove_temp(&path);
                }
                let transition = self.move_to(Stage::Acquiring);
                self.enter_acquiring();
                transition
            }
        }
    }

    fn defer(&mut self, request: Deferred) -> Transition {
        debug!(?request, "Finalization in flight; request queued");
        self.deferred.push_back(request);
        Transition::Queued
    }

    // -- Internals ------------------------------------------------------------

    fn enter_acquiring(&mut self) {
        remove_temp(&self.capture_target());
        let bridge = self.collaborators.bridge.as_mut();
        bridge.set_auto_capture(self.config.auto_capture_default);
        bridge.set_live_detection(self.config.live_detection_default);
        if let Err(err) = bridge.start() {
            warn!(error = %err, "Capture surface failed to start");
        }
    }

    fn move_to(&mut self, to: Stage) -> Transition {
        let from = self.state.transition(to);
        Transition::Moved { from, to }
    }

    /// Whether an event tagged `generation` for `stage` should be applied.
    fn accepts(&self, generation: Generation, stage: Stage, event: &str) -> bool {
        if !self.state.is_current(generation) {
            debug!(event, %generation, current = %self.generation(), "Stale event discarded");
            return false;
        }
        if self.stage() != stage {
            debug!(event, stage = ?self.stage(), "Event for another stage discarded");
            return false;
        }
        true
    }

    /// Surface `err`; fatal kinds end the run in FAILED.
    fn report(&mut self, err: WorkflowError) -> Transition {
        if err.is_fatal() && !self.stage().is_terminal() {
            error!(error = %err, "Fatal workflow error");
            let transition = self.move_to(Stage::Failed);
            self.sink.on_error(err);
            self.sweep(None);
            transition
        } else {
            warn!(error = %err, "Workflow error");
            self.sink.on_error(err);
            Transition::Unchanged(self.stage())
        }
    }

    /// Delete every workflow-owned temp file except `keep`.
    fn sweep(&mut self, keep: Option<&Path>) {
        let protected = self.state.caller_paths();
        let mut doomed = self.state.clear();
        doomed.extend(
            CandidateKind::PRIORITY
                .iter()
                .map(|kind| self.work_dir.join(kind.file_name(self.config.image_format))),
        );
        doomed.sort();
        doomed.dedup();
        for path in doomed {
            if Some(path.as_path()) == keep || protected.contains(&path) {
                continue;
            }
            remove_temp(&path);
        }
    }
}

impl Drop for ScanWorkflow {
    /// An unfinished run cleans up its temp files. A run dropped mid
    /// finalization leaves them, since the background task may still be
    /// reading its source.
    fn drop(&mut self) {
        match self.stage() {
            stage if stage.is_terminal() => {}
            Stage::Finalizing => {
                warn!(run = %self.run_id, "Workflow dropped while finalizing; temp files kept");
            }
            stage => {
                debug!(run = %self.run_id, ?stage, "Workflow dropped unfinished; sweeping");
                self.sweep(None);
            }
        }
    }
}

fn remove_temp(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Temp file removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "Cannot remove temp file"),
    }
}
