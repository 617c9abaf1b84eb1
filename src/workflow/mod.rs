//! Workflow Management Layer
//!
//! Graph descriptions, the tool registry they bind against, and the
//! repositories that hold graphs and runs:
//! - Type definitions (WorkflowState, GraphDefinition, Run)
//! - Lock-free tool registry using ArcSwap
//! - Graph binding with eager validation
//! - In-memory and SQLite run stores

// Core workflow type definitions
pub mod types;

// Tool capability table
pub mod registry;

// Definition -> bound graph
pub mod graph;

// Graph repository and the run store abstraction
pub mod storage;

// SQLite-backed run store
pub mod sqlite;

// Re-export commonly used types
pub use graph::Graph;
pub use registry::{FnTool, Tool, ToolRegistry};
pub use sqlite::SqliteRunStore;
pub use storage::{GraphRepository, InMemoryRunStore, RunStore};
pub use types::{ExecutionLogEntry, GraphDefinition, Run, RunStatus, WorkflowState};
