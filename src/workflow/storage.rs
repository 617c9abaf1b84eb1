//! Graph and run repositories
//!
//! Graphs live in an in-memory, lock-free repository (they hold bound tool
//! operations and are never persisted). Runs go through the [`RunStore`]
//! trait, which has an in-memory implementation here and a SQLite one in
//! `workflow::sqlite`.
//!
//! Both in-memory maps use ArcSwap: readers load a complete snapshot, writers
//! publish a new map in one atomic pointer swap, so a reader never observes a
//! partially written record.

use crate::error::Result;
use crate::workflow::{
    graph::Graph,
    types::{NewRun, Run, RunUpdate},
};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

/// In-memory repository of bound graphs
#[derive(Debug)]
pub struct GraphRepository {
    /// Key: graph_id, Value: immutable bound graph
    graphs: ArcSwap<HashMap<String, Arc<Graph>>>,
}

impl Default for GraphRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            graphs: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Store a graph under a freshly generated identifier
    pub fn create(&self, graph: Graph) -> String {
        let graph_id = Uuid::new_v4().to_string();
        let graph = Arc::new(graph);

        self.graphs.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(graph_id.clone(), Arc::clone(&graph));
            next
        });

        tracing::info!("📊 Stored graph {} ({} nodes)", graph_id, graph.node_count());
        graph_id
    }

    /// Get a graph by ID (lock-free read)
    pub fn get(&self, graph_id: &str) -> Option<Arc<Graph>> {
        self.graphs.load().get(graph_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.graphs.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage backend for run records
///
/// `update` replaces every mutable field of a record at once; implementations
/// must make that replacement atomic with respect to concurrent `get` calls.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Store a new run and return its generated identifier
    async fn create(&self, run: NewRun) -> Result<String>;

    async fn get(&self, run_id: &str) -> Result<Option<Run>>;

    /// Replace a run's state, log, status and error; returns false if the run
    /// does not exist
    async fn update(&self, run_id: &str, update: RunUpdate) -> Result<bool>;
}

/// Run store backed by an ArcSwap'd map
///
/// Records are kept as `Arc<Run>` and never mutated in place: an update builds
/// the replacement record and swaps the map pointer, so a reader holding an
/// older snapshot keeps seeing a consistent (if stale) record.
#[derive(Debug)]
pub struct InMemoryRunStore {
    runs: ArcSwap<HashMap<String, Arc<Run>>>,
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self {
            runs: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.runs.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create(&self, new_run: NewRun) -> Result<String> {
        let now = chrono::Utc::now();
        let run = Arc::new(Run {
            id: Uuid::new_v4().to_string(),
            graph_id: new_run.graph_id,
            state: new_run.state,
            log: new_run.log,
            status: new_run.status,
            error: None,
            created_at: now,
            updated_at: now,
        });

        self.runs.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(run.id.clone(), Arc::clone(&run));
            next
        });

        Ok(run.id.clone())
    }

    async fn get(&self, run_id: &str) -> Result<Option<Run>> {
        Ok(self.runs.load().get(run_id).map(|run| (**run).clone()))
    }

    async fn update(&self, run_id: &str, update: RunUpdate) -> Result<bool> {
        let mut found = false;

        self.runs.rcu(|current| {
            let mut next = (**current).clone();
            found = match next.get(run_id) {
                Some(existing) => {
                    let replaced = Run {
                        state: update.state.clone(),
                        log: update.log.clone(),
                        status: update.status,
                        error: update.error.clone(),
                        updated_at: chrono::Utc::now(),
                        ..(**existing).clone()
                    };
                    next.insert(run_id.to_string(), Arc::new(replaced));
                    true
                }
                None => false,
            };
            next
        });

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{ExecutionLogEntry, RunStatus, WorkflowState};

    fn new_run() -> NewRun {
        NewRun {
            graph_id: "g-1".to_string(),
            state: WorkflowState::default(),
            log: Vec::new(),
            status: RunStatus::Running,
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemoryRunStore::new();
        let id = store.create(new_run()).await.unwrap();

        let run = store.get(&id).await.unwrap().unwrap();
        assert_eq!(run.id, id);
        assert_eq!(run.graph_id, "g-1");
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.log.is_empty());
    }

    #[tokio::test]
    async fn identifiers_are_never_reused() {
        let store = InMemoryRunStore::new();
        let a = store.create(new_run()).await.unwrap();
        let b = store.create(new_run()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn update_replaces_whole_record() {
        let store = InMemoryRunStore::new();
        let id = store.create(new_run()).await.unwrap();
        let before = store.get(&id).await.unwrap().unwrap();

        let mut state = WorkflowState::default();
        state.done = true;
        let log = vec![ExecutionLogEntry::executed("a", &state)];
        assert!(store
            .update(&id, RunUpdate::completed(state.clone(), log))
            .await
            .unwrap());

        let after = store.get(&id).await.unwrap().unwrap();
        assert_eq!(after.status, RunStatus::Completed);
        assert_eq!(after.log.len(), 1);
        assert!(after.state.done);
        assert_eq!(after.created_at, before.created_at);
        // The snapshot taken earlier is unaffected by the swap
        assert!(before.log.is_empty());
    }

    #[tokio::test]
    async fn update_of_unknown_run_reports_missing() {
        let store = InMemoryRunStore::new();
        let updated = store
            .update("nope", RunUpdate::completed(WorkflowState::default(), vec![]))
            .await
            .unwrap();
        assert!(!updated);
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[test]
    fn graph_repository_round_trip() {
        use crate::workflow::{registry::ToolRegistry, types::GraphDefinition};

        let registry = ToolRegistry::new();
        registry.register_fn("noop", |state: WorkflowState| async move { Ok(state) });
        let graph = Graph::bind(
            GraphDefinition {
                nodes: [("a".to_string(), "noop".to_string())].into_iter().collect(),
                edges: HashMap::new(),
                entry_node: "a".to_string(),
                threshold: 0.8,
            },
            &registry,
        )
        .unwrap();

        let repo = GraphRepository::new();
        let id = repo.create(graph);
        assert_eq!(repo.get(&id).unwrap().entry_node(), "a");
        assert!(repo.get("missing").is_none());
        assert_eq!(repo.len(), 1);
    }
}
