//! Core workflow type definitions
//!
//! Defines the state threaded through a run, the graph description submitted by
//! clients, and the run record kept by the run store. All of these are
//! serialized to JSON for the API and for the SQLite run store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Key under which threshold-driven tools look up the quality threshold
pub const QUALITY_THRESHOLD_KEY: &str = "quality_threshold";

/// Default graph threshold when a definition omits it
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Shared state passed from node to node during a run
///
/// Each tool receives the state by value and hands back the (possibly rewritten)
/// state, so a single in-flight run is the only owner at any point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Open-ended payload (e.g. { "source_code": "...", "issues": [...] })
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Quality metric, conventionally within [0, 1]
    #[serde(default)]
    pub quality_score: f64,
    /// Raised by a tool to stop the run after the current node
    #[serde(default)]
    pub done: bool,
}

impl WorkflowState {
    /// Read a numeric field from the payload
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }

    /// Read a string field from the payload
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Insert or replace a payload field
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }
}

/// A graph as submitted by a client
///
/// Nodes map a logical node name to the tool it runs; edges map a node to its
/// single successor. Terminal nodes simply have no entry in `edges`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    /// Logical node name -> tool name (e.g. "extract" -> "extract_functions")
    pub nodes: HashMap<String, String>,
    /// Node name -> next node name
    #[serde(default)]
    pub edges: HashMap<String, String>,
    /// Node where execution begins
    pub entry_node: String,
    /// Threshold handed to threshold-driven tools through the initial state
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// One node execution within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Logical node name that was executed
    pub node: String,
    /// Human-readable description
    pub message: String,
    /// Full state as returned by the node's tool
    pub state_snapshot: WorkflowState,
}

impl ExecutionLogEntry {
    pub fn executed(node: &str, state: &WorkflowState) -> Self {
        Self {
            node: node.to_string(),
            message: format!("Executed node '{}'", node),
            state_snapshot: state.clone(),
        }
    }
}

/// Lifecycle status of a run record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Background execution has been scheduled and has not settled yet
    Running,
    /// Execution reached a terminal condition
    Completed,
    /// Execution aborted with an error (see `Run::error`)
    Failed,
    /// Execution was aborted on request
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }
}

/// A stored run of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub graph_id: String,
    /// Initial state while running, final state once settled
    pub state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
    pub status: RunStatus,
    /// Failure description for failed or cancelled runs
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a run record; the store assigns the identifier
#[derive(Debug, Clone)]
pub struct NewRun {
    pub graph_id: String,
    pub state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
    pub status: RunStatus,
}

/// Whole-record replacement of a run's mutable fields
#[derive(Debug, Clone)]
pub struct RunUpdate {
    pub state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
    pub status: RunStatus,
    pub error: Option<String>,
}

impl RunUpdate {
    pub fn completed(state: WorkflowState, log: Vec<ExecutionLogEntry>) -> Self {
        Self {
            state,
            log,
            status: RunStatus::Completed,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_deserializes_with_defaults() {
        let state: WorkflowState = serde_json::from_value(json!({ "data": { "a": 1 } })).unwrap();
        assert_eq!(state.get_f64("a"), Some(1.0));
        assert_eq!(state.quality_score, 0.0);
        assert!(!state.done);
    }

    #[test]
    fn definition_threshold_defaults() {
        let definition: GraphDefinition = serde_json::from_value(json!({
            "nodes": { "a": "noop" },
            "entry_node": "a"
        }))
        .unwrap();
        assert_eq!(definition.threshold, DEFAULT_THRESHOLD);
        assert!(definition.edges.is_empty());
    }

    #[test]
    fn run_status_round_trips_through_text() {
        for status in [
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("paused"), None);
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn log_entry_names_node() {
        let entry = ExecutionLogEntry::executed("extract", &WorkflowState::default());
        assert_eq!(entry.message, "Executed node 'extract'");
    }
}
