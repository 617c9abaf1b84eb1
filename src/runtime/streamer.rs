//! Poll-driven run log streaming
//!
//! A streamer task re-reads a run record on a fixed interval and forwards the
//! log entries it has not delivered yet, then one terminal message. Delivery is
//! in recorded order with no gaps or repeats. The task ends as soon as the
//! receiving side is dropped.

use crate::workflow::{
    storage::RunStore,
    types::{ExecutionLogEntry, RunStatus},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};

/// Default delay between two reads of the run record
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

const CHANNEL_CAPACITY: usize = 64;

/// A message delivered to a log observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// A log entry not delivered before
    Log {
        run_id: String,
        entry: ExecutionLogEntry,
    },
    /// The run finished; always the last message
    Completed { run_id: String, quality_score: f64 },
    /// The run failed or was cancelled; always the last message
    Failed { run_id: String, error: String },
    /// The run could not be read; always the only or last message
    Error { message: String },
}

impl StreamMessage {
    /// Whether this is the last message of its stream
    ///
    /// Log messages are followed by more messages; every other variant closes
    /// the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamMessage::Log { .. })
    }
}

/// Spawns polling tasks over a run store
///
/// The streamer never writes; it only re-reads run records, so any number of
/// observers can follow the same run without coordinating with the task that
/// executes it.
#[derive(Clone)]
pub struct LogStreamer {
    runs: Arc<dyn RunStore>,
    poll_interval: Duration,
}

impl LogStreamer {
    /// Create a streamer reading from `runs` every `poll_interval`
    pub fn new(runs: Arc<dyn RunStore>, poll_interval: Duration) -> Self {
        Self {
            runs,
            poll_interval,
        }
    }

    /// Start streaming a run's log
    ///
    /// Spawns a polling task that owns the sending half of a bounded channel.
    /// The receiver yields every log entry exactly once, in recorded order,
    /// followed by a single terminal message, after which the channel closes.
    /// Dropping the receiver stops the polling task at its next send or wait.
    pub fn subscribe(&self, run_id: impl Into<String>) -> mpsc::Receiver<StreamMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.spawn_pump(run_id.into(), tx);
        rx
    }

    fn spawn_pump(&self, run_id: String, tx: mpsc::Sender<StreamMessage>) -> JoinHandle<()> {
        let streamer = self.clone();

        tokio::spawn(async move {
            if streamer.pump(&run_id, &tx).await.is_err() || tx.is_closed() {
                tracing::debug!("👋 Log observer for run {} went away", run_id);
            }
        })
    }

    /// Poll loop; an `Err` means the observer disconnected
    async fn pump(
        &self,
        run_id: &str,
        tx: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), mpsc::error::SendError<StreamMessage>> {
        let mut delivered = 0usize;

        loop {
            let run = match self.runs.get(run_id).await {
                Ok(Some(run)) => run,
                Ok(None) => {
                    return tx
                        .send(StreamMessage::Error {
                            message: "Run not found".to_string(),
                        })
                        .await;
                }
                Err(e) => {
                    tracing::error!("❌ Failed to read run {} for streaming: {}", run_id, e);
                    return tx
                        .send(StreamMessage::Error {
                            message: e.to_string(),
                        })
                        .await;
                }
            };

            if let Some(fresh) = run.log.get(delivered..) {
                for entry in fresh {
                    tx.send(StreamMessage::Log {
                        run_id: run_id.to_string(),
                        entry: entry.clone(),
                    })
                    .await?;
                }
                delivered = run.log.len();
            }

            // Termination follows the record status only; a running record
            // still carries the initial state
            if run.status.is_terminal() {
                let terminal = match run.status {
                    RunStatus::Completed => StreamMessage::Completed {
                        run_id: run_id.to_string(),
                        quality_score: run.state.quality_score,
                    },
                    status => StreamMessage::Failed {
                        run_id: run_id.to_string(),
                        error: run.error.unwrap_or_else(|| status.as_str().to_string()),
                    },
                };
                return tx.send(terminal).await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = tx.closed() => return Ok(()),
            }
        }
    }
}
