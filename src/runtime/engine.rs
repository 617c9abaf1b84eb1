//! Graph execution engine
//!
//! Walks a bound graph from its entry node, one node at a time, until a tool
//! raises the `done` flag, a node has no successor, or the step limit is hit.

use crate::error::{Error, Result};
use crate::workflow::{
    graph::Graph,
    types::{ExecutionLogEntry, WorkflowState, QUALITY_THRESHOLD_KEY},
};
use serde_json::Value;

/// Default bound on node dispatches per run
pub const DEFAULT_MAX_STEPS: usize = 100;

/// Final state and ordered log of a finished execution
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
}

/// Sequential node walker with a hard step limit
///
/// Holds no per-run state, so one engine is shared by every run of the
/// service, inline and background alike. Each node dispatch counts as one
/// step; a run that would dispatch more than `max_steps` nodes fails with
/// `StepLimitExceeded` instead of looping forever on a cyclic graph.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    max_steps: usize,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl ExecutionEngine {
    /// Create an engine that fails runs dispatching more than `max_steps` nodes
    ///
    /// A limit of zero would reject every run before its entry node, so it is
    /// raised to one.
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps: max_steps.max(1),
        }
    }

    /// Effective step limit after clamping
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Execute a graph to completion
    ///
    /// The state is seeded with the graph threshold under `quality_threshold`
    /// unless the caller already provided one. The engine itself never compares
    /// the score to the threshold; that is left to the tools.
    pub async fn execute(&self, graph: &Graph, mut state: WorkflowState) -> Result<Execution> {
        let started = std::time::Instant::now();

        if !state.data.contains_key(QUALITY_THRESHOLD_KEY) {
            state.set(QUALITY_THRESHOLD_KEY, Value::from(graph.threshold()));
        }

        let mut log = Vec::new();
        let mut current = graph.entry_node().to_string();

        loop {
            if log.len() >= self.max_steps {
                tracing::warn!(
                    "⛔ Step limit of {} reached at node '{}'",
                    self.max_steps,
                    current
                );
                return Err(Error::StepLimitExceeded {
                    limit: self.max_steps,
                });
            }

            let tool = graph
                .tool(&current)
                .ok_or_else(|| Error::UnknownNode(current.clone()))?;

            tracing::debug!("📍 Step {}: executing node '{}'", log.len() + 1, current);
            let node_started = std::time::Instant::now();

            state = tool
                .call(state)
                .await
                .map_err(|e| Error::ToolFailed {
                    node: current.clone(),
                    message: format!("{:#}", e),
                })?;

            tracing::debug!(
                "✅ Node '{}' completed in {:?} (score {:.3}, done {})",
                current,
                node_started.elapsed(),
                state.quality_score,
                state.done
            );
            log.push(ExecutionLogEntry::executed(&current, &state));

            if state.done {
                break;
            }

            match graph.next(&current) {
                Some(next) => current = next.to_string(),
                None => break,
            }
        }

        tracing::info!(
            "🎉 Graph execution finished after {} steps in {:?} (done: {})",
            log.len(),
            started.elapsed(),
            state.done
        );

        Ok(Execution { state, log })
    }
}
