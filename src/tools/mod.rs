//! Tool catalog
//!
//! Concrete tools that can be bound to graph nodes. The engine knows nothing
//! about them beyond the `Tool` trait.

// Rule-based code review workflow
pub mod code_review;

pub use code_review::{code_review_graph, register_code_review_tools};
