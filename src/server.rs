//! Server setup and initialization
//!
//! Wires together all components: tool registry, repositories, execution
//! engine, run manager, log streamer, and HTTP routes. Every component is
//! constructed once here and handed to whoever needs it.

use crate::{
    api::{create_graph_routes, create_log_routes, AppState},
    config::{Config, StorageBackend},
    runtime::{ExecutionEngine, LogStreamer, RunManager},
    tools::{code_review_graph, register_code_review_tools},
    workflow::{
        types::DEFAULT_THRESHOLD, Graph, GraphRepository, InMemoryRunStore, RunStore,
        SqliteRunStore, ToolRegistry,
    },
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the run store selected by the configuration
async fn create_run_store(config: &Config) -> Result<Arc<dyn RunStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("🧠 Using in-memory run store");
            Ok(Arc::new(InMemoryRunStore::new()))
        }
        StorageBackend::Sqlite => {
            tracing::info!("📁 Ensuring data directory exists: {}", config.storage.data_dir);
            std::fs::create_dir_all(&config.storage.data_dir).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create data directory '{}': {}",
                    config.storage.data_dir,
                    e
                )
            })?;

            let store = SqliteRunStore::open(config.storage.sqlite_path())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open run database: {}", e))?;
            Ok(Arc::new(store))
        }
    }
}

/// Build the shared application state
pub async fn create_state(config: &Config) -> Result<AppState> {
    tracing::info!("🔧 Registering code review tools");
    let registry = Arc::new(ToolRegistry::new());
    register_code_review_tools(&registry, config.engine.tool_latency());

    let graphs = Arc::new(GraphRepository::new());
    let runs = create_run_store(config).await?;

    tracing::info!("📊 Creating default code review graph");
    let default_graph = Graph::bind(code_review_graph(DEFAULT_THRESHOLD), &registry)
        .map_err(|e| anyhow::anyhow!("Failed to build default review graph: {}", e))?;
    let default_graph_id = graphs.create(default_graph);

    tracing::info!(
        "🚀 Initializing execution engine (max {} steps per run)",
        config.engine.max_steps
    );
    let engine = Arc::new(ExecutionEngine::new(config.engine.max_steps));
    let manager = Arc::new(RunManager::new(graphs, Arc::clone(&runs), engine));
    let streamer = LogStreamer::new(runs, config.engine.stream_poll_interval());

    Ok(AppState {
        registry,
        manager,
        streamer,
        default_graph_id,
    })
}

/// Create the router for an existing application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Graph management and run endpoints
        .merge(create_graph_routes())
        // WebSocket log streaming
        .merge(create_log_routes())
        .with_state(state)
}

/// Create the main Axum application with all routes
pub async fn create_app(config: Config) -> Result<Router> {
    let state = create_state(&config).await?;
    tracing::info!("✅ Application initialized successfully");
    Ok(create_router(state))
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting workgraph server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
