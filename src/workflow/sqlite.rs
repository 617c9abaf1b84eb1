//! SQLite persistence layer for run records
//!
//! Runs are stored one row per run, with the state and log kept as JSON
//! columns. An update rewrites the whole row in a single statement, which is
//! what gives readers the all-or-nothing view the run lifecycle relies on.

use crate::error::{Error, Result};
use crate::workflow::{
    storage::RunStore,
    types::{NewRun, Run, RunStatus, RunUpdate},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use std::path::Path;
use uuid::Uuid;

/// SQLite-backed run store
#[derive(Debug, Clone)]
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Wrap an existing pool; call [`init_schema`](Self::init_schema) before use
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) a database file and initialize the schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("🗄️ Opening run database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Private in-memory database, mostly for tests
    ///
    /// Limited to one connection: every SQLite in-memory connection is its own
    /// database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the runs table. Safe to call multiple times.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                graph_id TEXT NOT NULL,
                state TEXT NOT NULL,
                log TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_graph_id ON runs(graph_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn decode(row: SqliteRow) -> Result<Run> {
        let state: String = row.try_get("state")?;
        let log: String = row.try_get("log")?;
        let status: String = row.try_get("status")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Run {
            id: row.try_get("id")?,
            graph_id: row.try_get("graph_id")?,
            state: serde_json::from_str(&state)?,
            log: serde_json::from_str(&log)?,
            status: RunStatus::parse(&status).ok_or_else(|| {
                Error::Storage(sqlx::Error::Decode(
                    format!("unknown run status '{}'", status).into(),
                ))
            })?,
            error: row.try_get("error")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Storage(sqlx::Error::Decode(Box::new(e))))
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn create(&self, run: NewRun) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO runs (id, graph_id, state, log, status, error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&run.graph_id)
        .bind(serde_json::to_string(&run.state)?)
        .bind(serde_json::to_string(&run.log)?)
        .bind(run.status.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get(&self, run_id: &str) -> Result<Option<Run>> {
        let row = sqlx::query(
            "SELECT id, graph_id, state, log, status, error, created_at, updated_at FROM runs WHERE id = ?",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::decode).transpose()
    }

    async fn update(&self, run_id: &str, update: RunUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET state = ?, log = ?, status = ?, error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(&update.state)?)
        .bind(serde_json::to_string(&update.log)?)
        .bind(update.status.as_str())
        .bind(&update.error)
        .bind(Utc::now().to_rfc3339())
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
