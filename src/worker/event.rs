//! # Status Events
//!
//! Event types produced while a worker run is active, and the line-delimited
//! JSON wire shape the worker writes on its structured stream.

use serde::{Deserialize, Serialize};

/// Lifecycle status reported by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Hardware preparation before sampling begins
    Setup,

    /// User-visible instruction text (non-terminal; clients keep polling)
    Instruction,

    /// Sampling progress
    Progress,

    /// Terminal failure
    Failed,

    /// Terminal success
    Complete,
}

impl WorkerStatus {
    /// True for statuses that end a worker run from the client's perspective
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Complete)
    }
}

/// One unit of progress/failure/completion information from a worker run.
///
/// `sequence` increases monotonically within a run so polling clients can
/// detect duplicates. `duration`/`remaining` are optional hints (seconds)
/// that setup and progress updates may carry for progress rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: WorkerStatus,

    #[serde(rename = "msg")]
    pub message: String,

    #[serde(rename = "sequence_counter")]
    pub sequence: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<f64>,
}

/// One line of the worker's structured output stream.
///
/// Workers emit single-line JSON objects like
/// `{"type":"update","status":"progress","msg":"...","remaining":4.0}`;
/// the `type` field is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerUpdate {
    pub status: WorkerStatus,

    #[serde(default)]
    pub msg: String,

    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub remaining: Option<f64>,
}

impl WorkerUpdate {
    /// Parse one structured-stream line
    pub fn parse_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}
