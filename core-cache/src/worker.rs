//! Cache worker task.
//!
//! The worker exclusively owns the [`CacheStore`]. Callers reach it only
//! through [`Envelope`]s; every envelope carries a task id which the worker
//! echoes back with the reply so the client can match them up.

use bridge_traits::time::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::snapshot::ResponseSnapshot;
use crate::stats::CacheStats;
use crate::store::{CacheLookup, CacheStore, SaveOutcome};

pub(crate) type TaskId = u64;

#[derive(Debug)]
pub(crate) enum CacheCommand {
    Get {
        key: String,
    },
    Save {
        key: String,
        response: ResponseSnapshot,
        max_age: Option<i64>,
    },
    Remove {
        key: String,
    },
    Clear,
    Stats,
    SetBudget {
        bytes: u64,
    },
    Sweep,
    Shutdown,
}

impl CacheCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            CacheCommand::Get { .. } => "get",
            CacheCommand::Save { .. } => "save",
            CacheCommand::Remove { .. } => "remove",
            CacheCommand::Clear => "clear",
            CacheCommand::Stats => "stats",
            CacheCommand::SetBudget { .. } => "set_budget",
            CacheCommand::Sweep => "sweep",
            CacheCommand::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug)]
pub(crate) enum CacheReply {
    Lookup(CacheLookup),
    Saved(SaveOutcome),
    Removed(bool),
    Cleared(usize),
    Stats(CacheStats),
    BudgetSet { evicted: usize },
    Swept(usize),
    Stopped,
}

#[derive(Debug)]
pub(crate) struct Envelope {
    pub task_id: TaskId,
    pub command: CacheCommand,
}

pub(crate) struct CacheWorker {
    store: CacheStore,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
}

impl CacheWorker {
    pub(crate) fn new(store: CacheStore, clock: Arc<dyn Clock>, sweep_interval: Duration) -> Self {
        Self {
            store,
            clock,
            sweep_interval,
        }
    }

    /// Serve envelopes until shutdown or until every sender is gone.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Envelope>,
        replies: mpsc::UnboundedSender<(TaskId, CacheReply)>,
    ) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        sweep.tick().await;

        loop {
            tokio::select! {
                envelope = commands.recv() => {
                    let Some(Envelope { task_id, command }) = envelope else {
                        debug!("cache command channel closed");
                        break;
                    };
                    let stop = matches!(command, CacheCommand::Shutdown);
                    let reply = self.handle(command);
                    if replies.send((task_id, reply)).is_err() {
                        break;
                    }
                    if stop {
                        break;
                    }
                }
                _ = sweep.tick() => {
                    let removed = self.store.sweep(self.clock.unix_timestamp_millis());
                    if removed > 0 {
                        debug!(removed, "periodic sweep removed expired entries");
                    }
                }
            }
        }

        // Close the command side before the reply side so that any send
        // racing with shutdown fails instead of waiting forever.
        drop(commands);
        info!(entries = self.store.len(), "cache worker stopped");
    }

    fn handle(&mut self, command: CacheCommand) -> CacheReply {
        let now = self.clock.unix_timestamp_millis();
        trace!(command = command.name(), "cache worker handling command");

        match command {
            CacheCommand::Get { key } => CacheReply::Lookup(self.store.get(&key, now)),
            CacheCommand::Save {
                key,
                response,
                max_age,
            } => CacheReply::Saved(self.store.save_with_max_age(&key, response, now, max_age)),
            CacheCommand::Remove { key } => CacheReply::Removed(self.store.remove(&key)),
            CacheCommand::Clear => CacheReply::Cleared(self.store.clear()),
            CacheCommand::Stats => CacheReply::Stats(self.store.stats()),
            CacheCommand::SetBudget { bytes } => CacheReply::BudgetSet {
                evicted: self.store.set_budget(bytes),
            },
            CacheCommand::Sweep => CacheReply::Swept(self.store.sweep(now)),
            CacheCommand::Shutdown => CacheReply::Stopped,
        }
    }
}
