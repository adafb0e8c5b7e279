//! Handle to the cache worker.

use bridge_traits::time::Clock;
use bytes::Bytes;
use core_codec::CodecPool;
use core_runtime::ByteBudget;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::snapshot::ResponseSnapshot;
use crate::stats::CacheStats;
use crate::store::{CacheLookup, CacheStore, SaveOutcome};
use crate::worker::{CacheCommand, CacheReply, CacheWorker, Envelope, TaskId};

/// Lifetime of custom JSON entries when the caller does not pick one.
pub const DEFAULT_CUSTOM_MAX_AGE: i64 = 60;

type PendingMap = Arc<Mutex<HashMap<TaskId, oneshot::Sender<CacheReply>>>>;

/// Cloneable handle to the response cache.
///
/// All operations are messages to a dedicated worker task; the handle
/// shares no state with the store itself.
#[derive(Clone)]
pub struct CacheClient {
    commands: mpsc::UnboundedSender<Envelope>,
    pending: PendingMap,
    next_task: Arc<AtomicU64>,
    codec: CodecPool,
}

impl CacheClient {
    /// Spawn the worker and its reply pump on the current runtime.
    pub fn spawn(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        debug!(
            budget = %config.budget,
            sweep_secs = config.sweep_interval.as_secs(),
            "spawning cache worker"
        );

        let store = CacheStore::new(config.budget.as_bytes(), config.fallback_max_age_secs());
        let worker = CacheWorker::new(store, clock, config.sweep_interval);
        tokio::spawn(worker.run(command_rx, reply_tx));
        tokio::spawn(pump_replies(reply_rx, pending.clone()));

        Self {
            commands: command_tx,
            pending,
            next_task: Arc::new(AtomicU64::new(1)),
            codec: CodecPool::default(),
        }
    }

    async fn call(&self, command: CacheCommand) -> Result<CacheReply> {
        let task_id = self.next_task.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(task_id, tx);

        if self.commands.send(Envelope { task_id, command }).is_err() {
            self.pending.lock().remove(&task_id);
            return Err(CacheError::WorkerUnavailable);
        }

        rx.await.map_err(|_| CacheError::WorkerUnavailable)
    }

    #[instrument(skip(self), level = "trace")]
    pub async fn get(&self, url: &str) -> Result<CacheLookup> {
        match self.call(CacheCommand::Get { key: url.to_string() }).await? {
            CacheReply::Lookup(lookup) => Ok(lookup),
            _ => Err(CacheError::UnexpectedReply("get")),
        }
    }

    #[instrument(skip(self, response), fields(status = response.status), level = "trace")]
    pub async fn save(&self, url: &str, response: ResponseSnapshot) -> Result<SaveOutcome> {
        self.save_inner(url, response, None).await
    }

    async fn save_inner(
        &self,
        url: &str,
        response: ResponseSnapshot,
        max_age: Option<i64>,
    ) -> Result<SaveOutcome> {
        let command = CacheCommand::Save {
            key: url.to_string(),
            response,
            max_age,
        };
        match self.call(command).await? {
            CacheReply::Saved(outcome) => Ok(outcome),
            _ => Err(CacheError::UnexpectedReply("save")),
        }
    }

    pub async fn remove(&self, url: &str) -> Result<bool> {
        match self.call(CacheCommand::Remove { key: url.to_string() }).await? {
            CacheReply::Removed(removed) => Ok(removed),
            _ => Err(CacheError::UnexpectedReply("remove")),
        }
    }

    pub async fn clear(&self) -> Result<usize> {
        match self.call(CacheCommand::Clear).await? {
            CacheReply::Cleared(count) => Ok(count),
            _ => Err(CacheError::UnexpectedReply("clear")),
        }
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        match self.call(CacheCommand::Stats).await? {
            CacheReply::Stats(stats) => Ok(stats),
            _ => Err(CacheError::UnexpectedReply("stats")),
        }
    }

    /// Replace the byte budget; returns how many entries were evicted.
    pub async fn set_budget(&self, budget: ByteBudget) -> Result<usize> {
        let command = CacheCommand::SetBudget {
            bytes: budget.as_bytes(),
        };
        match self.call(command).await? {
            CacheReply::BudgetSet { evicted } => Ok(evicted),
            _ => Err(CacheError::UnexpectedReply("set_budget")),
        }
    }

    /// Run an expiry sweep now instead of waiting for the timer.
    pub async fn sweep(&self) -> Result<usize> {
        match self.call(CacheCommand::Sweep).await? {
            CacheReply::Swept(removed) => Ok(removed),
            _ => Err(CacheError::UnexpectedReply("sweep")),
        }
    }

    /// Stop the worker. Later calls fail with [`CacheError::WorkerUnavailable`].
    pub async fn shutdown(&self) -> Result<()> {
        match self.call(CacheCommand::Shutdown).await {
            Ok(_) | Err(CacheError::WorkerUnavailable) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Read a JSON value stored with [`CacheClient::save_custom`].
    pub async fn get_custom<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let entry = match self.get(key).await? {
            CacheLookup::Miss => return Ok(None),
            CacheLookup::Fresh(entry) | CacheLookup::Revalidate(entry) => entry,
        };
        // URL keys may hold gzip-delivered responses
        let response = entry.response.inflate(&self.codec).await?;
        Ok(Some(serde_json::from_slice(&response.content)?))
    }

    /// Store an arbitrary JSON-serializable value under `key`.
    ///
    /// `max_age_seconds` defaults to [`DEFAULT_CUSTOM_MAX_AGE`]; a negative
    /// value keeps the entry until it is evicted or cleared.
    pub async fn save_custom<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        max_age_seconds: Option<i64>,
    ) -> Result<()> {
        let json = serde_json::to_vec(value)?;
        let response = ResponseSnapshot::new(200, key, Bytes::from(json))
            .with_status_text("OK")
            .with_header("Content-Type", "application/json");

        let max_age = max_age_seconds.unwrap_or(DEFAULT_CUSTOM_MAX_AGE);
        match self.save_inner(key, response, Some(max_age)).await? {
            SaveOutcome::Stored { .. } => Ok(()),
            outcome => {
                warn!(key, ?outcome, "custom cache entry not stored");
                Err(CacheError::Rejected {
                    key: key.to_string(),
                    reason: format!("{outcome:?}"),
                })
            }
        }
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

/// Route worker replies to the callers waiting on them.
async fn pump_replies(
    mut replies: mpsc::UnboundedReceiver<(TaskId, CacheReply)>,
    pending: PendingMap,
) {
    while let Some((task_id, reply)) = replies.recv().await {
        let waiter = pending.lock().remove(&task_id);
        match waiter {
            Some(tx) => {
                if tx.send(reply).is_err() {
                    trace!(task_id, "cache caller went away before its reply");
                }
            }
            None => warn!(task_id, "cache reply without a pending request"),
        }
    }

    // worker is gone; fail everyone still waiting
    pending.lock().clear();
}
