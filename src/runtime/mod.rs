//! Runtime Execution Layer
//!
//! This module runs bound graphs and exposes their progress:
//! - Sequential node walking with a step limit
//! - Inline and supervised background runs
//! - Poll-driven log streaming to observers

// Node-by-node execution engine
pub mod engine;

// Sync/async run orchestration
pub mod lifecycle;

// Run log streaming
pub mod streamer;

// Re-export main types
pub use engine::{Execution, ExecutionEngine};
pub use lifecycle::{RunManager, RunOutcome};
pub use streamer::{LogStreamer, StreamMessage};
