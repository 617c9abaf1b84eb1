//! HTTP API Layer
//!
//! REST and WebSocket endpoints over the graph engine:
//! - Graph creation and sync/async runs
//! - Run state queries and cancellation
//! - Live run log streaming over WebSocket

// Graph and run endpoints
pub mod graphs;

// WebSocket log streaming
pub mod logs;

use crate::{
    runtime::{LogStreamer, RunManager},
    workflow::ToolRegistry,
    Error,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;

// Re-export router builders
pub use graphs::create_graph_routes;
pub use logs::create_log_routes;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Tools graphs are bound against
    pub registry: Arc<ToolRegistry>,
    /// Run orchestration (owns the graph repository and run store handles)
    pub manager: Arc<RunManager>,
    /// Log streaming over the run store
    pub streamer: LogStreamer,
    /// Code review graph created at startup
    pub default_graph_id: String,
}

/// Engine error carried to the HTTP boundary
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::GraphNotFound(_) | Error::RunNotFound(_) => StatusCode::NOT_FOUND,
            Error::ToolNotRegistered(_) | Error::InvalidGraph(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            // 422 for execution failures vs 500 for system errors
            e if e.is_execution_failure() => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", self.0);
        } else {
            tracing::warn!("⚠️ Request rejected ({}): {}", status, self.0);
        }

        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}
