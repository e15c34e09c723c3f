use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    cache::{container::CachePayload, handler::CacheHandler, storage::SpillStorage},
    config::EngineConfig,
};

/// Handler-side hooks the manager uses to select and spill eviction victims.
pub(crate) trait EvictableShard: Send + Sync {
    /// LRU stamp of the oldest unpinned resident container, if any.
    fn oldest_unpinned(&self) -> Option<u64>;

    /// Spill (or, on storage failure, drop) the oldest unpinned resident
    /// container and return the resident bytes freed.
    fn spill_oldest_unpinned(&self) -> usize;
}

struct ManagerState {
    usage: usize,
    shards: Vec<Weak<dyn EvictableShard>>,
}

struct ManagerShared {
    budget: usize,
    storage: Arc<dyn SpillStorage>,
    clock: AtomicU64,
    next_spill_key: AtomicU64,
    state: Mutex<ManagerState>,
}

/// Process-wide cache accountant shared by every [`CacheHandler`].
///
/// Tracks total resident bytes across handlers and, when the configured budget
/// is exceeded, spills least-recently-used unpinned containers until usage is
/// back under budget. The budget is an explicit constructor argument tied to
/// the owning session, never a hidden singleton.
#[derive(Clone)]
pub struct CacheManager {
    shared: Arc<ManagerShared>,
}

impl CacheManager {
    /// Build a manager with an explicit byte budget and spill backend.
    pub fn new(budget_bytes: usize, storage: Arc<dyn SpillStorage>) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                budget: budget_bytes,
                storage,
                clock: AtomicU64::new(1),
                next_spill_key: AtomicU64::new(1),
                state: Mutex::new(ManagerState {
                    usage: 0,
                    shards: Vec::new(),
                }),
            }),
        }
    }

    /// Build a manager from an [`EngineConfig`].
    pub fn from_config(cfg: &EngineConfig, storage: Arc<dyn SpillStorage>) -> Self {
        Self::new(cfg.cache_budget_bytes, storage)
    }

    /// Create a handler for one logical resource, wired to this manager.
    pub fn new_handler<P: CachePayload>(&self) -> CacheHandler<P> {
        CacheHandler::new(self.clone())
    }

    /// Configured budget in bytes.
    pub fn budget_bytes(&self) -> usize {
        self.shared.budget
    }

    /// Current resident usage estimate in bytes.
    pub fn usage_bytes(&self) -> usize {
        self.shared.state.lock().map(|s| s.usage).unwrap_or(0)
    }

    pub(crate) fn storage(&self) -> Arc<dyn SpillStorage> {
        Arc::clone(&self.shared.storage)
    }

    /// Monotonic LRU stamp.
    pub(crate) fn tick(&self) -> u64 {
        self.shared.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Unique key for a container's spill slot.
    pub(crate) fn alloc_spill_key(&self) -> u64 {
        self.shared.next_spill_key.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register_shard(&self, shard: Weak<dyn EvictableShard>) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.shards.push(shard);
        }
    }

    /// Adjust the usage estimate and evict if the budget is now exceeded.
    ///
    /// Handlers call this only after releasing their own lock, so eviction can
    /// re-enter any handler (including the caller) safely.
    pub(crate) fn add_usage(&self, delta: isize) {
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        if delta >= 0 {
            state.usage = state.usage.saturating_add(delta as usize);
        } else {
            state.usage = state.usage.saturating_sub(delta.unsigned_abs());
        }
        self.enforce_locked(&mut state);
    }

    /// Spill LRU containers until usage fits the budget.
    pub fn enforce_budget(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            self.enforce_locked(&mut state);
        }
    }

    fn enforce_locked(&self, state: &mut ManagerState) {
        while state.usage > self.shared.budget {
            state.shards.retain(|w| w.strong_count() > 0);

            let mut victim: Option<(Arc<dyn EvictableShard>, u64)> = None;
            for weak in &state.shards {
                let Some(shard) = weak.upgrade() else {
                    continue;
                };
                let Some(stamp) = shard.oldest_unpinned() else {
                    continue;
                };
                match &victim {
                    Some((_, best)) if *best <= stamp => {}
                    _ => victim = Some((shard, stamp)),
                }
            }

            let Some((shard, stamp)) = victim else {
                break;
            };
            let freed = shard.spill_oldest_unpinned();
            if freed == 0 {
                break;
            }
            tracing::debug!(freed, stamp, usage = state.usage, "cache eviction spill");
            state.usage = state.usage.saturating_sub(freed);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/manager.rs"]
mod tests;
