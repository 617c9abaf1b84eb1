//! WebSocket run log streaming
//!
//! GET /graph/ws/logs/{run_id}
//! Sends one JSON text frame per stream message, then closes.

use crate::{api::AppState, runtime::LogStreamer};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};

pub fn create_log_routes() -> Router<AppState> {
    Router::new().route("/graph/ws/logs/{run_id}", get(logs_websocket))
}

async fn logs_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_logs(socket, state.streamer, run_id))
}

async fn stream_logs(mut socket: WebSocket, streamer: LogStreamer, run_id: String) {
    tracing::info!("📡 Log stream opened for run {}", run_id);
    let mut messages = streamer.subscribe(run_id.clone());

    while let Some(message) = messages.recv().await {
        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("❌ Failed to encode stream message for run {}: {}", run_id, e);
                break;
            }
        };

        if socket.send(Message::Text(frame.into())).await.is_err() {
            // Client went away; dropping the receiver stops the poller
            tracing::debug!("👋 Log stream client for run {} disconnected", run_id);
            return;
        }

        if message.is_terminal() {
            break;
        }
    }

    let _ = socket.send(Message::Close(None)).await;
    tracing::info!("📴 Log stream closed for run {}", run_id);
}
