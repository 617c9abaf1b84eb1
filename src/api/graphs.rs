//! Graph and run REST endpoints
//!
//! Graph creation, inline and background runs, run state lookups,
//! cancellation, and the one-call code review shortcut.

use crate::{
    api::{ApiError, AppState},
    runtime::RunOutcome,
    tools::code_review::SOURCE_CODE_KEY,
    workflow::{
        types::{DEFAULT_THRESHOLD, QUALITY_THRESHOLD_KEY},
        ExecutionLogEntry, Graph, GraphDefinition, RunStatus, WorkflowState,
    },
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

/// Request body for graph creation
#[derive(Debug, Deserialize)]
pub struct GraphCreateRequest {
    pub graph: GraphDefinition,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphCreateResponse {
    pub graph_id: String,
}

/// Request body for sync and async runs
#[derive(Debug, Deserialize)]
pub struct GraphRunRequest {
    pub graph_id: String,
    #[serde(default)]
    pub initial_state: WorkflowState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphRunResponse {
    pub run_id: String,
    pub final_state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
}

impl From<RunOutcome> for GraphRunResponse {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            run_id: outcome.run_id,
            final_state: outcome.state,
            log: outcome.log,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphRunStateResponse {
    pub run_id: String,
    pub state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
    pub status: RunStatus,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub run_id: String,
    pub cancelled: bool,
}

/// Request body for the convenience code review endpoint
#[derive(Debug, Deserialize)]
pub struct SimpleReviewRequest {
    pub source_code: String,
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
}

fn default_quality_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// Create graph and run routes
pub fn create_graph_routes() -> Router<AppState> {
    Router::new()
        .route("/graph/create", post(create_graph))
        .route("/graph/run", post(run_graph))
        .route("/graph/run/async", post(run_graph_async))
        .route("/graph/run/{run_id}/cancel", post(cancel_run))
        .route("/graph/state/{run_id}", get(get_run_state))
        .route("/graph/review/simple", post(simple_code_review))
}

/// Create a graph
///
/// POST /graph/create
/// Body: { "graph": { "nodes": {...}, "edges": {...}, "entry_node": "...", "threshold": 0.8 } }
async fn create_graph(
    State(state): State<AppState>,
    Json(payload): Json<GraphCreateRequest>,
) -> Result<Json<GraphCreateResponse>, ApiError> {
    let graph = Graph::bind(payload.graph, &state.registry)?;
    let graph_id = state.manager.graphs().create(graph);

    Ok(Json(GraphCreateResponse { graph_id }))
}

/// Run a graph to completion
///
/// POST /graph/run
/// Body: { "graph_id": "...", "initial_state": { "data": {...} } }
async fn run_graph(
    State(state): State<AppState>,
    Json(payload): Json<GraphRunRequest>,
) -> Result<Json<GraphRunResponse>, ApiError> {
    let outcome = state
        .manager
        .run_sync(&payload.graph_id, payload.initial_state)
        .await?;

    Ok(Json(outcome.into()))
}

/// Start a graph run in the background and return immediately
///
/// POST /graph/run/async
/// Poll /graph/state/{run_id} or stream /graph/ws/logs/{run_id} for progress.
async fn run_graph_async(
    State(state): State<AppState>,
    Json(payload): Json<GraphRunRequest>,
) -> Result<Json<GraphRunResponse>, ApiError> {
    let outcome = state
        .manager
        .run_async(&payload.graph_id, payload.initial_state)
        .await?;

    Ok(Json(outcome.into()))
}

/// GET /graph/state/{run_id}
async fn get_run_state(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<GraphRunStateResponse>, ApiError> {
    let run = state.manager.get_run(&run_id).await?;

    Ok(Json(GraphRunStateResponse {
        run_id: run.id,
        state: run.state,
        log: run.log,
        status: run.status,
        error: run.error,
    }))
}

/// POST /graph/run/{run_id}/cancel
async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let cancelled = state.manager.cancel(&run_id).await?;

    Ok(Json(CancelResponse { run_id, cancelled }))
}

/// Review raw source code with the default review graph in one call
///
/// POST /graph/review/simple
/// Body: { "source_code": "...", "quality_threshold": 0.8 }
async fn simple_code_review(
    State(state): State<AppState>,
    Json(payload): Json<SimpleReviewRequest>,
) -> Result<Json<GraphRunResponse>, ApiError> {
    let mut initial = WorkflowState::default();
    initial.set(SOURCE_CODE_KEY, payload.source_code);
    initial.set(QUALITY_THRESHOLD_KEY, payload.quality_threshold);

    let outcome = state
        .manager
        .run_sync(&state.default_graph_id, initial)
        .await?;

    Ok(Json(outcome.into()))
}
