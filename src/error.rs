//! Error taxonomy for graph construction, execution and run bookkeeping.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Construction errors
    #[error("Tool '{0}' is not registered")]
    ToolNotRegistered(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    // Execution errors
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Step limit exceeded ({limit} steps)")]
    StepLimitExceeded { limit: usize },

    #[error("Node '{node}' failed: {message}")]
    ToolFailed { node: String, message: String },

    // Lookup errors
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error was raised while a graph was executing, as opposed to
    /// while it was being resolved or stored.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            Error::UnknownNode(_) | Error::StepLimitExceeded { .. } | Error::ToolFailed { .. }
        )
    }
}
