//! Step lifecycle events
//!
//! Every step reports start, progress and end events to the experiment's
//! sink. Events are for observability only; nothing reads them back to make
//! decisions.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Receiver of step lifecycle events
pub trait ProgressSink: Send + Sync {
    fn step_start(&self, step: &str, label: &str);
    fn step_progress(&self, step: &str, label: &str);
    fn step_end(&self, step: &str, output: serde_json::Value);
}

/// Logs events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn step_start(&self, step: &str, label: &str) {
        info!(step, "{}", label);
    }

    fn step_progress(&self, step: &str, label: &str) {
        debug!(step, "{}", label);
    }

    fn step_end(&self, step: &str, output: serde_json::Value) {
        info!(step, output = %output, "step finished");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressKind {
    Start { label: String },
    Progress { label: String },
    End { output: serde_json::Value },
}

/// One recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProgressKind,
}

/// Collects every event in order
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, step: &str, kind: ProgressKind) {
        self.events.lock().push(ProgressEvent {
            step: step.to_string(),
            timestamp: Utc::now(),
            kind,
        });
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Output of the last `step_end` of a step
    pub fn last_output(&self, step: &str) -> Option<serde_json::Value> {
        self.events.lock().iter().rev().find_map(|e| match &e.kind {
            ProgressKind::End { output } if e.step == step => Some(output.clone()),
            _ => None,
        })
    }

    /// Steps that reported `step_start`, in order
    pub fn started_steps(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e.kind, ProgressKind::Start { .. }))
            .map(|e| e.step.clone())
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn step_start(&self, step: &str, label: &str) {
        self.push(
            step,
            ProgressKind::Start {
                label: label.to_string(),
            },
        );
    }

    fn step_progress(&self, step: &str, label: &str) {
        self.push(
            step,
            ProgressKind::Progress {
                label: label.to_string(),
            },
        );
    }

    fn step_end(&self, step: &str, output: serde_json::Value) {
        self.push(step, ProgressKind::End { output });
    }
}
