//! workgraph: a minimal graph workflow engine
//!
//! Named nodes bound to reusable tools, single-successor edges, and runs that
//! execute inline or in the background while observers poll or stream their
//! progress.

// Core configuration and setup
pub mod config;

// Error taxonomy shared by every layer
pub mod error;

// Workflow management layer - state, graphs, tool registry, repositories
pub mod workflow;

// Runtime execution layer - engine, run lifecycle, log streaming
pub mod runtime;

// Concrete tools (the code review workflow)
pub mod tools;

// HTTP API layer - REST endpoints and WebSocket log streaming
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{Error, Result};
pub use runtime::{ExecutionEngine, LogStreamer, RunManager, StreamMessage};
pub use server::start_server;
pub use workflow::{Graph, GraphDefinition, Tool, ToolRegistry, WorkflowState};
