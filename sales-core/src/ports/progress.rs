//! Progress port
//!
//! Status messages are the only thing a pipeline run shares with the
//! interface. They are handed over through a sink so a run on a worker
//! thread never touches interface state directly.

use std::sync::mpsc::Sender;

use serde::Serialize;

/// Pipeline stage a progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Load,
    Clean,
    Analyze,
    Persist,
    Verify,
    Charts,
    Report,
    Done,
}

/// A status message from a running pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub step: PipelineStep,
    pub message: String,
    /// `false` when the step failed
    pub success: bool,
}

impl ProgressEvent {
    pub fn ok(step: PipelineStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            success: true,
        }
    }

    pub fn failed(step: PipelineStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            success: false,
        }
    }
}

/// Receiver side of progress reporting
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Channel hand-off: the receiving thread drains events at its own pace.
/// A dropped receiver is ignored; progress never fails a run.
impl ProgressSink for Sender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}
