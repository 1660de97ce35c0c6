// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-workflow: The scan workflow engine.
//
// `ScanWorkflow` sequences acquisition, optional crop and enhancement, and a
// background finalization step, threading the candidate images through a
// generation-tagged `WorkflowState` and reporting to a `ResultSink`.

mod acquisition;
pub mod finalize;
pub mod orchestrator;
pub mod sink;
pub mod state;

pub use finalize::FinalizeCompletion;
pub use orchestrator::{Collaborators, ScanWorkflow, Transition};
pub use sink::{ChannelSink, ResultSink, SinkEvent};
pub use state::WorkflowState;
