//! Lock-free tool registry using ArcSwap
//!
//! Maps stable tool names to operations. Registration swaps the whole table
//! pointer, so graphs being bound concurrently always resolve against a
//! complete table and see every registration made before them.

use crate::error::{Error, Result};
use crate::workflow::types::WorkflowState;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::{collections::HashMap, future::Future, sync::Arc};

/// A reusable unit of work bound to graph nodes
///
/// A tool takes ownership of the state, may suspend (I/O, latency), and returns
/// the state the next node should see.
#[async_trait]
pub trait Tool: Send + Sync {
    async fn call(&self, state: WorkflowState) -> anyhow::Result<WorkflowState>;
}

/// Adapter turning an async closure into a [`Tool`]
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<WorkflowState>> + Send + 'static,
{
    async fn call(&self, state: WorkflowState) -> anyhow::Result<WorkflowState> {
        (self.0)(state).await
    }
}

/// Capability table of named tools
///
/// Constructed once at startup and shared with whatever binds graphs. Reads
/// are lock-free loads of the current table; registrations publish a new
/// table, so a graph bound mid-registration sees either all or none of it.
pub struct ToolRegistry {
    /// Key: tool name, Value: shared operation
    tools: ArcSwap<HashMap<String, Arc<dyn Tool>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Install or overwrite a tool (last write wins)
    pub fn register(&self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        let name = name.into();
        self.tools.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(name.clone(), Arc::clone(&tool));
            next
        });
        tracing::debug!("🔧 Registered tool: {}", name);
    }

    /// Register an async closure as a tool
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<WorkflowState>> + Send + 'static,
    {
        self.register(name, Arc::new(FnTool(func)));
    }

    /// Resolve a tool by name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ToolNotRegistered(name.to_string()))
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
