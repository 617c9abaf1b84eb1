//! End-to-end engine scenarios over the code review workflow

use std::{sync::Arc, time::Duration};
use workgraph::{
    runtime::{ExecutionEngine, LogStreamer, RunManager, StreamMessage},
    tools::{code_review_graph, register_code_review_tools},
    workflow::{
        types::QUALITY_THRESHOLD_KEY, Graph, GraphDefinition, GraphRepository, InMemoryRunStore,
        RunStatus, RunStore, SqliteRunStore, ToolRegistry, WorkflowState,
    },
    Error,
};

const SAMPLE_SOURCE: &str = "\ndef add(a, b):\n    return a + b\n";

fn review_registry(latency: Duration) -> ToolRegistry {
    let registry = ToolRegistry::new();
    register_code_review_tools(&registry, latency);
    registry
}

fn review_state(source: &str, threshold: f64) -> WorkflowState {
    let mut state = WorkflowState::default();
    state.set("source_code", source);
    state.set(QUALITY_THRESHOLD_KEY, threshold);
    state
}

fn build_manager(
    registry: &ToolRegistry,
    definition: GraphDefinition,
    runs: Arc<dyn RunStore>,
    max_steps: usize,
) -> (RunManager, String) {
    let graphs = Arc::new(GraphRepository::new());
    let graph_id = graphs.create(Graph::bind(definition, registry).unwrap());
    let manager = RunManager::new(graphs, runs, Arc::new(ExecutionEngine::new(max_steps)));
    (manager, graph_id)
}

#[tokio::test]
async fn code_review_workflow_reaches_done() {
    let registry = review_registry(Duration::from_millis(10));
    let graph = Graph::bind(code_review_graph(0.8), &registry).unwrap();

    let execution = ExecutionEngine::default()
        .execute(&graph, review_state(SAMPLE_SOURCE, 0.5))
        .await
        .unwrap();

    assert!(execution.state.done);
    assert!((0.0..=1.0).contains(&execution.state.quality_score));
    assert_eq!(execution.log.len(), 5);

    let order: Vec<&str> = execution.log.iter().map(|e| e.node.as_str()).collect();
    assert_eq!(order, vec!["extract", "complexity", "issues", "suggest", "evaluate"]);
    assert_eq!(
        execution.state.data["functions"],
        serde_json::json!(["add"])
    );
}

#[tokio::test]
async fn unmet_threshold_ends_on_implicit_terminal() {
    let registry = review_registry(Duration::ZERO);
    let graph = Graph::bind(code_review_graph(0.8), &registry).unwrap();

    let noisy = "def f():\n    print(eval('x'))  # TODO\n";
    let execution = ExecutionEngine::default()
        .execute(&graph, review_state(noisy, 0.99))
        .await
        .unwrap();

    assert!(!execution.state.done);
    assert_eq!(execution.log.len(), 5);
}

#[tokio::test]
async fn async_run_is_empty_then_complete() {
    let registry = review_registry(Duration::from_millis(100));
    let (manager, graph_id) = build_manager(
        &registry,
        code_review_graph(0.8),
        Arc::new(InMemoryRunStore::new()),
        100,
    );

    let outcome = manager
        .run_async(&graph_id, review_state(SAMPLE_SOURCE, 0.5))
        .await
        .unwrap();
    assert!(outcome.log.is_empty());

    let immediate = manager.get_run(&outcome.run_id).await.unwrap();
    assert_eq!(immediate.log.len(), 0);
    assert!(!immediate.state.done);
    assert_eq!(immediate.status, RunStatus::Running);

    let settled = manager.wait(&outcome.run_id).await.unwrap();
    assert_eq!(settled.log.len(), 5);
    assert!(settled.state.done);
    assert_eq!(settled.status, RunStatus::Completed);
}

#[tokio::test]
async fn async_run_with_sqlite_store() {
    let registry = review_registry(Duration::from_millis(10));
    let store = SqliteRunStore::in_memory().await.unwrap();
    let (manager, graph_id) = build_manager(&registry, code_review_graph(0.8), Arc::new(store), 100);

    let outcome = manager
        .run_async(&graph_id, review_state(SAMPLE_SOURCE, 0.5))
        .await
        .unwrap();
    let settled = manager.wait(&outcome.run_id).await.unwrap();

    assert_eq!(settled.log.len(), 5);
    assert!(settled.state.done);
}

#[tokio::test]
async fn looping_graph_fails_with_step_limit() {
    let registry = ToolRegistry::new();
    registry.register_fn("tick", |mut state: WorkflowState| async move {
        let ticks = state.get_f64("ticks").unwrap_or(0.0);
        state.set("ticks", ticks + 1.0);
        Ok(state)
    });

    let definition = GraphDefinition {
        nodes: [("first", "tick"), ("second", "tick"), ("third", "tick")]
            .into_iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect(),
        edges: [("first", "second"), ("second", "third"), ("third", "first")]
            .into_iter()
            .map(|(f, t)| (f.to_string(), t.to_string()))
            .collect(),
        entry_node: "first".to_string(),
        threshold: 0.8,
    };
    let runs: Arc<dyn RunStore> = Arc::new(InMemoryRunStore::new());
    let (manager, graph_id) = build_manager(&registry, definition, Arc::clone(&runs), 25);

    let err = manager
        .run_sync(&graph_id, WorkflowState::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StepLimitExceeded { limit: 25 }));

    // The same failure in the background lands in the run record
    let outcome = manager
        .run_async(&graph_id, WorkflowState::default())
        .await
        .unwrap();
    let run = manager.wait(&outcome.run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("Step limit"));
}

#[tokio::test]
async fn streamed_entries_concatenate_to_final_log() {
    let registry = review_registry(Duration::from_millis(50));
    let runs: Arc<dyn RunStore> = Arc::new(InMemoryRunStore::new());
    let (manager, graph_id) = build_manager(&registry, code_review_graph(0.8), Arc::clone(&runs), 100);
    let streamer = LogStreamer::new(Arc::clone(&runs), Duration::from_millis(10));

    let outcome = manager
        .run_async(&graph_id, review_state(SAMPLE_SOURCE, 0.5))
        .await
        .unwrap();
    let mut rx = streamer.subscribe(outcome.run_id.clone());

    let mut streamed = Vec::new();
    let mut terminal = None;
    while let Some(message) = rx.recv().await {
        match message {
            StreamMessage::Log { entry, .. } => streamed.push(entry),
            other => terminal = Some(other),
        }
    }

    let run = manager.get_run(&outcome.run_id).await.unwrap();
    assert_eq!(streamed, run.log);
    assert_eq!(
        terminal,
        Some(StreamMessage::Completed {
            run_id: outcome.run_id,
            quality_score: run.state.quality_score,
        })
    );
}

#[tokio::test]
async fn repeated_sync_runs_are_deterministic() {
    let registry = review_registry(Duration::ZERO);
    let (manager, graph_id) = build_manager(
        &registry,
        code_review_graph(0.8),
        Arc::new(InMemoryRunStore::new()),
        100,
    );

    let first = manager
        .run_sync(&graph_id, review_state(SAMPLE_SOURCE, 0.5))
        .await
        .unwrap();
    let second = manager
        .run_sync(&graph_id, review_state(SAMPLE_SOURCE, 0.5))
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.state, second.state);
    assert_eq!(first.log, second.log);
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let registry = review_registry(Duration::ZERO);
    let (manager, _) = build_manager(
        &registry,
        code_review_graph(0.8),
        Arc::new(InMemoryRunStore::new()),
        100,
    );

    assert!(matches!(
        manager.get_run("never-issued").await,
        Err(Error::RunNotFound(_))
    ));
}

#[tokio::test]
async fn async_run_with_done_initial_state_streams_full_log() {
    let registry = review_registry(Duration::from_millis(50));
    let runs: Arc<dyn RunStore> = Arc::new(InMemoryRunStore::new());
    let (manager, graph_id) = build_manager(&registry, code_review_graph(0.8), Arc::clone(&runs), 100);
    let streamer = LogStreamer::new(Arc::clone(&runs), Duration::from_millis(5));

    let mut initial = review_state(SAMPLE_SOURCE, 0.5);
    initial.done = true;
    let outcome = manager.run_async(&graph_id, initial).await.unwrap();
    let mut rx = streamer.subscribe(outcome.run_id.clone());

    let mut streamed = Vec::new();
    let mut terminal = None;
    while let Some(message) = rx.recv().await {
        match message {
            StreamMessage::Log { entry, .. } => streamed.push(entry),
            other => terminal = Some(other),
        }
    }

    // The entry node still runs once before the done flag ends the walk
    let run = manager.wait(&outcome.run_id).await.unwrap();
    assert_eq!(run.log.len(), 1);
    assert_eq!(streamed, run.log);
    assert!(matches!(terminal, Some(StreamMessage::Completed { .. })));
}
