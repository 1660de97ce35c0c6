// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Workflow state: current stage, generation counter, and the three candidate
// slots. Slot setters enforce the forward-flow invariants so the orchestrator
// never has to re-check them at finalization time.

use std::path::PathBuf;

use scanwerk_core::error::{ErrorKind, WorkflowError};
use scanwerk_core::types::{CandidateKind, Generation, ImageArtifact, Stage};
use tracing::info;

#[derive(Debug)]
pub struct WorkflowState {
    stage: Stage,
    generation: Generation,
    original: Option<ImageArtifact>,
    cropped: Option<ImageArtifact>,
    transformed: Option<ImageArtifact>,
    /// The user asked for enhancement while cropping.
    enhance_requested: bool,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            stage: Stage::Acquiring,
            generation: Generation::default(),
            original: None,
            cropped: None,
            transformed: None,
            enhance_requested: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn original(&self) -> Option<&ImageArtifact> {
        self.original.as_ref()
    }

    pub fn cropped(&self) -> Option<&ImageArtifact> {
        self.cropped.as_ref()
    }

    pub fn transformed(&self) -> Option<&ImageArtifact> {
        self.transformed.as_ref()
    }

    pub fn enhance_requested(&self) -> bool {
        self.enhance_requested
    }

    /// Whether an event tagged `generation` still applies.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Highest-priority filled slot.
    pub fn select_candidate(&self) -> Option<(CandidateKind, &ImageArtifact)> {
        CandidateKind::PRIORITY
            .into_iter()
            .find_map(|kind| self.slot(kind).map(|artifact| (kind, artifact)))
    }

    pub fn slot(&self, kind: CandidateKind) -> Option<&ImageArtifact> {
        match kind {
            CandidateKind::Original => self.original.as_ref(),
            CandidateKind::Cropped => self.cropped.as_ref(),
            CandidateKind::Transformed => self.transformed.as_ref(),
        }
    }

    // -- Mutation (orchestrator only) -----------------------------------------

    /// Move to `to` and start a new generation. Returns the previous stage.
    pub(crate) fn transition(&mut self, to: Stage) -> Stage {
        let from = self.stage;
        self.stage = to;
        self.generation = self.generation.next();
        info!(?from, ?to, generation = %self.generation, "Stage transition");
        from
    }

    pub(crate) fn set_original(&mut self, artifact: ImageArtifact) -> Result<(), WorkflowError> {
        if self.original.is_some() {
            return Err(WorkflowError::with_detail(
                ErrorKind::InvalidImage,
                "an original image is already held for this acquisition",
            ));
        }
        self.original = Some(artifact);
        Ok(())
    }

    pub(crate) fn set_cropped(&mut self, artifact: ImageArtifact) -> Result<(), WorkflowError> {
        self.require_original()?;
        self.cropped = Some(artifact);
        Ok(())
    }

    /// Enhancement may run on the cropped image or directly on the original.
    pub(crate) fn set_transformed(&mut self, artifact: ImageArtifact) -> Result<(), WorkflowError> {
        self.require_original()?;
        self.transformed = Some(artifact);
        Ok(())
    }

    pub(crate) fn request_enhancement(&mut self) {
        self.enhance_requested = true;
    }

    /// Empty every slot, returning the paths the workflow owns and must delete.
    pub(crate) fn clear(&mut self) -> Vec<PathBuf> {
        self.enhance_requested = false;
        [self.original.take(), self.cropped.take(), self.transformed.take()]
            .into_iter()
            .flatten()
            .filter_map(|artifact| artifact.owned_path().map(PathBuf::from))
            .collect()
    }

    /// Paths held in slots that belong to the caller.
    pub(crate) fn caller_paths(&self) -> Vec<PathBuf> {
        [&self.original, &self.cropped, &self.transformed]
            .into_iter()
            .flatten()
            .filter(|artifact| artifact.owned_path().is_none())
            .filter_map(|artifact| artifact.path().map(PathBuf::from))
            .collect()
    }

    fn require_original(&self) -> Result<(), WorkflowError> {
        if self.original.is_none() {
            return Err(WorkflowError::with_detail(
                ErrorKind::NoCandidateImage,
                "no original image has been acquired",
            ));
        }
        Ok(())
    }
}
