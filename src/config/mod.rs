//! Configuration management for the workgraph service
//!
//! Handles server binding, engine limits, and run storage selection.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Engine configuration
    pub engine: EngineConfig,
    /// Run storage configuration
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Execution and streaming parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum node dispatches per run before failing with a step limit error
    pub max_steps: usize,
    /// Delay between two reads of a run record while streaming its log
    pub stream_poll_interval_ms: u64,
    /// Simulated latency of the complexity check tool
    pub tool_latency_ms: u64,
}

impl EngineConfig {
    pub fn stream_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stream_poll_interval_ms)
    }

    pub fn tool_latency(&self) -> Duration {
        Duration::from_millis(self.tool_latency_ms)
    }
}

/// Where run records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// Run storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding runs.db when the SQLite backend is selected
    pub data_dir: String,
}

impl StorageConfig {
    pub fn sqlite_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("runs.db")
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        let backend = match std::env::var("WORKGRAPH_STORAGE").as_deref() {
            Ok("sqlite") => StorageBackend::Sqlite,
            _ => StorageBackend::Memory,
        };

        Self {
            server: ServerConfig {
                host: std::env::var("WORKGRAPH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("WORKGRAPH_PORT", 3004),
            },
            engine: EngineConfig {
                max_steps: env_or("WORKGRAPH_MAX_STEPS", crate::runtime::engine::DEFAULT_MAX_STEPS),
                stream_poll_interval_ms: env_or("WORKGRAPH_STREAM_POLL_MS", 300),
                tool_latency_ms: env_or("WORKGRAPH_TOOL_LATENCY_MS", 200),
            },
            storage: StorageConfig {
                backend,
                data_dir: std::env::var("WORKGRAPH_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            },
        }
    }
}
