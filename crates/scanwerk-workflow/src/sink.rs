// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result sinks: how the host hears about errors and the run's outcome.

use scanwerk_core::error::WorkflowError;
use scanwerk_core::types::ScanResult;
use tokio::sync::mpsc;
use tracing::debug;

/// Receiver for everything the workflow surfaces to the host.
///
/// Retriable errors may arrive any number of times through `on_error`. The
/// terminal outcome (`on_success`, a fatal `on_error`, or `on_close`) arrives
/// exactly once per run.
pub trait ResultSink {
    fn on_success(&mut self, result: ScanResult);
    fn on_error(&mut self, error: WorkflowError);
    /// The user cancelled; there is no result.
    fn on_close(&mut self);
}

/// One notification delivered through a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Success(ScanResult),
    Error(WorkflowError),
    Closed,
}

impl SinkEvent {
    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Success(_) | Self::Closed => true,
            Self::Error(err) => err.is_fatal(),
        }
    }
}

/// Sink that forwards events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            debug!("Result receiver dropped; event discarded");
        }
    }
}

impl ResultSink for ChannelSink {
    fn on_success(&mut self, result: ScanResult) {
        self.send(SinkEvent::Success(result));
    }

    fn on_error(&mut self, error: WorkflowError) {
        self.send(SinkEvent::Error(error));
    }

    fn on_close(&mut self) {
        self.send(SinkEvent::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_core::error::ErrorKind;

    #[test]
    fn events_arrive_in_order() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.on_error(WorkflowError::new(ErrorKind::CameraPermissionSoftDenied));
        sink.on_close();

        let first = rx.try_recv().expect("first");
        assert!(!first.is_terminal());
        assert_eq!(rx.try_recv().expect("second"), SinkEvent::Closed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_is_tolerated() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_close();
    }

    #[test]
    fn fatal_errors_are_terminal() {
        let event = SinkEvent::Error(WorkflowError::new(ErrorKind::CompressionFailed));
        assert!(event.is_terminal());
    }
}
