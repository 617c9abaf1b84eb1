//! workgraph server entry point
//!
//! Loads configuration from the environment and starts the HTTP server:
//! - Graph API at /graph/*
//! - Run log streaming at /graph/ws/logs/{run_id}
//! - Health check at /healthz

use workgraph::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3004 and in-memory run storage)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
