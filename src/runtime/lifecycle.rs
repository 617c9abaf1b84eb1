//! Run lifecycle management
//!
//! Starts graph runs either inline (the caller waits for the final state) or
//! in the background (the caller gets the run id immediately and observes the
//! run record). Background runs are supervised: the outcome, whether success,
//! tool failure, panic or cancellation, always lands in the run record.

use crate::error::{Error, Result};
use crate::runtime::engine::ExecutionEngine;
use crate::workflow::{
    graph::Graph,
    storage::{GraphRepository, RunStore},
    types::{ExecutionLogEntry, NewRun, Run, RunStatus, RunUpdate, WorkflowState},
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;

/// Attempts at writing a settled outcome before falling back to a bare failure
const RECORD_ATTEMPTS: u32 = 3;

/// Base delay between two outcome writes; grows linearly per attempt
const RECORD_RETRY_DELAY: Duration = Duration::from_millis(50);

/// What a caller gets back when starting a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: String,
    /// Final state for inline runs, the initial state for background runs
    pub state: WorkflowState,
    /// Full log for inline runs, empty for background runs
    pub log: Vec<ExecutionLogEntry>,
}

/// Handles retained for an in-flight background run
struct RunTask {
    abort: AbortHandle,
    settled: watch::Receiver<bool>,
}

/// Orchestrates graph executions and their run records
///
/// Owns handles to the graph repository, the run store and the engine, all
/// constructed once by the server and injected here. Background runs are
/// tracked until their supervisor has written the final record, which is what
/// makes `cancel` and `wait` possible.
pub struct RunManager {
    graphs: Arc<GraphRepository>,
    runs: Arc<dyn RunStore>,
    engine: Arc<ExecutionEngine>,
    /// Key: run_id of a background run that has not settled yet
    tasks: Arc<Mutex<HashMap<String, RunTask>>>,
}

impl RunManager {
    /// Create a manager over shared repositories and an engine
    pub fn new(
        graphs: Arc<GraphRepository>,
        runs: Arc<dyn RunStore>,
        engine: Arc<ExecutionEngine>,
    ) -> Self {
        Self {
            graphs,
            runs,
            engine,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Repository the manager resolves graph identifiers against
    ///
    /// Shared with the API layer, which stores newly bound graphs here so they
    /// become runnable immediately.
    pub fn graphs(&self) -> &Arc<GraphRepository> {
        &self.graphs
    }

    /// Run store holding every run record this manager creates
    ///
    /// Observers such as the log streamer read from the same store handle.
    pub fn runs(&self) -> &Arc<dyn RunStore> {
        &self.runs
    }

    fn graph(&self, graph_id: &str) -> Result<Arc<Graph>> {
        self.graphs
            .get(graph_id)
            .ok_or_else(|| Error::GraphNotFound(graph_id.to_string()))
    }

    /// Run a graph to completion and store the finished run
    ///
    /// Nothing is stored when the execution fails.
    pub async fn run_sync(&self, graph_id: &str, initial: WorkflowState) -> Result<RunOutcome> {
        let graph = self.graph(graph_id)?;
        tracing::info!("🚀 Starting run of graph {}", graph_id);

        let execution = self.engine.execute(&graph, initial).await?;

        let run_id = self
            .runs
            .create(NewRun {
                graph_id: graph_id.to_string(),
                state: execution.state.clone(),
                log: execution.log.clone(),
                status: RunStatus::Completed,
            })
            .await?;

        tracing::info!("✅ Run {} of graph {} completed", run_id, graph_id);

        Ok(RunOutcome {
            run_id,
            state: execution.state,
            log: execution.log,
        })
    }

    /// Store a running record and execute the graph in the background
    ///
    /// Returns as soon as the record exists. The background task replaces the
    /// record exactly once when the execution settles.
    pub async fn run_async(&self, graph_id: &str, initial: WorkflowState) -> Result<RunOutcome> {
        let graph = self.graph(graph_id)?;

        let run_id = self
            .runs
            .create(NewRun {
                graph_id: graph_id.to_string(),
                state: initial.clone(),
                log: Vec::new(),
                status: RunStatus::Running,
            })
            .await?;

        let engine = Arc::clone(&self.engine);
        let input = initial.clone();
        let worker = tokio::spawn(async move { engine.execute(&graph, input).await });
        let abort = worker.abort_handle();

        let (settled_tx, settled_rx) = watch::channel(false);
        let runs = Arc::clone(&self.runs);
        let tasks = Arc::clone(&self.tasks);
        let id = run_id.clone();
        let pre_run = initial.clone();

        // Hold the lock until the task is registered so the supervisor cannot
        // deregister before registration.
        let mut registered = self.tasks.lock().await;
        tokio::spawn(async move {
            let update = match worker.await {
                Ok(Ok(execution)) => {
                    tracing::info!("✅ Background run {} completed", id);
                    RunUpdate::completed(execution.state, execution.log)
                }
                Ok(Err(e)) => {
                    tracing::error!("❌ Background run {} failed: {}", id, e);
                    failed(pre_run.clone(), RunStatus::Failed, e.to_string())
                }
                Err(join) if join.is_cancelled() => {
                    tracing::warn!("⏹️ Background run {} cancelled", id);
                    failed(pre_run.clone(), RunStatus::Cancelled, "run cancelled".to_string())
                }
                Err(join) => {
                    tracing::error!("💥 Background run {} panicked: {}", id, join);
                    failed(
                        pre_run.clone(),
                        RunStatus::Failed,
                        format!("run task panicked: {}", join),
                    )
                }
            };

            record_outcome(runs.as_ref(), &id, update, pre_run).await;

            let _ = settled_tx.send(true);
            tasks.lock().await.remove(&id);
        });
        registered.insert(
            run_id.clone(),
            RunTask {
                abort,
                settled: settled_rx,
            },
        );
        drop(registered);

        tracing::info!("📨 Scheduled background run {} of graph {}", run_id, graph_id);

        Ok(RunOutcome {
            run_id,
            state: initial,
            log: Vec::new(),
        })
    }

    /// Current record of a run
    pub async fn get_run(&self, run_id: &str) -> Result<Run> {
        self.runs
            .get(run_id)
            .await?
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
    }

    /// Request cancellation of a background run
    ///
    /// Returns true when the worker was still executing and has been told to
    /// stop; its record then settles as `Cancelled`. Returns false when the run
    /// exists but its execution has already finished, even if the outcome is
    /// still being written. A worker that finishes in the same instant as the
    /// request can still settle as `Completed`, so the record remains the
    /// authority on how the run ended.
    pub async fn cancel(&self, run_id: &str) -> Result<bool> {
        if let Some(task) = self.tasks.lock().await.get(run_id) {
            if !task.abort.is_finished() {
                task.abort.abort();
                tracing::info!("⏹️ Cancellation requested for run {}", run_id);
                return Ok(true);
            }
        }

        self.get_run(run_id).await.map(|_| false)
    }

    /// Wait until a background run has settled and return its record
    ///
    /// Returns immediately for runs that are not in flight.
    pub async fn wait(&self, run_id: &str) -> Result<Run> {
        let settled = self
            .tasks
            .lock()
            .await
            .get(run_id)
            .map(|task| task.settled.clone());

        if let Some(mut settled) = settled {
            // A closed channel means the supervisor is gone; the record is final
            let _ = settled.wait_for(|done| *done).await;
        }

        self.get_run(run_id).await
    }
}

/// Write a settled outcome, retrying transient store failures
///
/// If every attempt fails, a minimal `Failed` record is attempted as a last
/// resort so that waiters and log observers are not left polling a record
/// that claims to be running.
async fn record_outcome(
    runs: &dyn RunStore,
    run_id: &str,
    update: RunUpdate,
    pre_run: WorkflowState,
) {
    let mut last_error = None;

    for attempt in 1..=RECORD_ATTEMPTS {
        match runs.update(run_id, update.clone()).await {
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Recording outcome of run {} failed (attempt {}/{}): {}",
                    run_id,
                    attempt,
                    RECORD_ATTEMPTS,
                    e
                );
                last_error = Some(e);
                if attempt < RECORD_ATTEMPTS {
                    tokio::time::sleep(RECORD_RETRY_DELAY * attempt).await;
                }
            }
        }
    }

    let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
    let fallback = failed(
        pre_run,
        RunStatus::Failed,
        format!("failed to record run outcome: {}", reason),
    );
    if let Err(e) = runs.update(run_id, fallback).await {
        tracing::error!("❌ Failed to record outcome of run {}: {}", run_id, e);
    }
}

fn failed(state: WorkflowState, status: RunStatus, error: String) -> RunUpdate {
    RunUpdate {
        state,
        log: Vec::new(),
        status,
        error: Some(error),
    }
}
