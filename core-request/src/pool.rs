//! # Slot Pools
//!
//! Bounded concurrency over a fixed set of slot identifiers.
//!
//! A [`SlotPool`] hands out [`SlotGuard`]s. When every slot is taken, callers
//! queue in FIFO order; a released slot goes straight to the oldest live
//! waiter, so it is never observed as free while someone is waiting.
//!
//! Every hand-out is stamped with a fresh [`SlotLease`]. Releasing a lease
//! that is no longer current (released twice, or already passed on) is
//! ignored, so one slot id never has two holders.
//!
//! Dropping an `acquire` future (timeout, abort) is safe at any point. If a
//! slot was already handed to it, the slot is passed on to the next waiter.
//!
//! [`SlotLanes`] pairs a normal and a priority pool with disjoint ids so that
//! priority requests never queue behind a normal backlog.

use bridge_traits::host::SlotId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{trace, warn};

/// Proof of holding one slot, as returned by [`SlotGuard::detach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLease {
    slot: SlotId,
    generation: u64,
}

impl SlotLease {
    pub fn id(&self) -> SlotId {
        self.slot
    }
}

struct PoolState {
    free: VecDeque<SlotId>,
    /// Current lease generation per handed-out slot
    held: HashMap<SlotId, u64>,
    next_generation: u64,
    waiters: VecDeque<oneshot::Sender<SlotLease>>,
}

impl PoolState {
    fn lease(&mut self, slot: SlotId) -> SlotLease {
        self.next_generation += 1;
        let lease = SlotLease {
            slot,
            generation: self.next_generation,
        };
        self.held.insert(slot, lease.generation);
        lease
    }

    fn take_free(&mut self) -> Option<SlotLease> {
        let slot = self.free.pop_front()?;
        Some(self.lease(slot))
    }
}

pub struct SlotPool {
    name: String,
    ids: Vec<SlotId>,
    state: Mutex<PoolState>,
}

impl SlotPool {
    pub fn new(name: impl Into<String>, ids: impl IntoIterator<Item = SlotId>) -> Arc<Self> {
        let ids: Vec<SlotId> = ids.into_iter().collect();
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(PoolState {
                free: ids.iter().copied().collect(),
                held: HashMap::new(),
                next_generation: 0,
                waiters: VecDeque::new(),
            }),
            ids,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn owns(&self, slot: SlotId) -> bool {
        self.ids.contains(&slot)
    }

    pub fn available(&self) -> usize {
        self.state.lock().free.len()
    }

    pub fn in_use(&self) -> usize {
        self.state.lock().held.len()
    }

    /// Callers currently queued for a slot.
    pub fn waiting(&self) -> usize {
        self.state
            .lock()
            .waiters
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<SlotGuard> {
        let lease = self.state.lock().take_free()?;
        Some(SlotGuard::new(Arc::clone(self), lease))
    }

    /// Wait for a slot.
    pub async fn acquire(self: &Arc<Self>) -> SlotGuard {
        loop {
            let rx = {
                let mut state = self.state.lock();
                if let Some(lease) = state.take_free() {
                    trace!(pool = %self.name, slot = lease.slot, "slot acquired");
                    return SlotGuard::new(Arc::clone(self), lease);
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                rx
            };

            trace!(pool = %self.name, "all slots busy, queued");
            let mut pending = PendingSlot {
                pool: Arc::clone(self),
                rx,
                received: false,
            };

            if let Ok(lease) = (&mut pending.rx).await {
                pending.received = true;
                trace!(pool = %self.name, slot = lease.slot, "slot handed over");
                return SlotGuard::new(Arc::clone(self), lease);
            }
        }
    }

    /// Return a slot to the pool.
    ///
    /// Only needed for slots taken out of a guard with [`SlotGuard::detach`].
    /// Leases from another pool or that are no longer current are ignored.
    pub fn release(&self, lease: SlotLease) {
        let slot = lease.slot;
        if !self.owns(slot) {
            warn!(pool = %self.name, slot, "release of a slot this pool does not own");
            return;
        }

        let mut state = self.state.lock();
        if state.held.get(&slot) != Some(&lease.generation) {
            warn!(pool = %self.name, slot, "release of a stale slot lease");
            return;
        }
        state.held.remove(&slot);

        while let Some(waiter) = state.waiters.pop_front() {
            let next = state.lease(slot);
            if waiter.send(next).is_ok() {
                return;
            }
            state.held.remove(&slot);
        }
        state.free.push_back(slot);
    }
}

impl fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SlotPool")
            .field("name", &self.name)
            .field("size", &self.ids.len())
            .field("free", &state.free.len())
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

/// Receiver side of a queued acquire.
struct PendingSlot {
    pool: Arc<SlotPool>,
    rx: oneshot::Receiver<SlotLease>,
    received: bool,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if self.received {
            return;
        }
        self.rx.close();
        if let Ok(lease) = self.rx.try_recv() {
            self.pool.release(lease);
        }
    }
}

/// Exclusive use of one slot; released on drop.
pub struct SlotGuard {
    pool: Arc<SlotPool>,
    lease: SlotLease,
    armed: bool,
}

impl SlotGuard {
    fn new(pool: Arc<SlotPool>, lease: SlotLease) -> Self {
        Self {
            pool,
            lease,
            armed: true,
        }
    }

    pub fn id(&self) -> SlotId {
        self.lease.slot
    }

    /// Keep the slot past the guard; the caller must [`SlotPool::release`] it.
    pub fn detach(mut self) -> SlotLease {
        self.armed = false;
        self.lease
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.armed {
            self.pool.release(self.lease);
        }
    }
}

impl fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotGuard")
            .field("pool", &self.pool.name)
            .field("slot", &self.lease.slot)
            .finish()
    }
}

/// Normal and priority pools with disjoint slot ids.
#[derive(Debug, Clone)]
pub struct SlotLanes {
    pub normal: Arc<SlotPool>,
    pub priority: Arc<SlotPool>,
}

impl SlotLanes {
    /// Normal slots take ids `0..normal`, priority slots the next `priority` ids.
    ///
    /// Counts beyond the `SlotId` range saturate; `CoreConfig::validate`
    /// keeps real configurations far below that.
    pub fn new(normal: usize, priority: usize) -> Self {
        let normal_end = SlotId::try_from(normal).unwrap_or(SlotId::MAX);
        let priority_end =
            normal_end.saturating_add(SlotId::try_from(priority).unwrap_or(SlotId::MAX));
        Self {
            normal: SlotPool::new("normal", 0..normal_end),
            priority: SlotPool::new("priority", normal_end..priority_end),
        }
    }

    pub fn lane(&self, priority: bool) -> &Arc<SlotPool> {
        if priority {
            &self.priority
        } else {
            &self.normal
        }
    }
}
