use std::sync::{Arc, Mutex, Weak};

use crate::{
    cache::{
        container::{CacheContainer, CachePayload, PayloadState},
        manager::{CacheManager, EvictableShard},
    },
    foundation::core::IndexRange,
};

struct HandlerShared<P: CachePayload> {
    manager: CacheManager,
    /// Containers sorted by `range.min`, ranges pairwise disjoint.
    inner: Mutex<Vec<CacheContainer<P>>>,
}

/// Range-keyed cache for one logical resource (one node's rendered frames,
/// one audio source's decoded seconds).
///
/// All mutation — `add`, eviction spill, reload — is serialized behind a
/// per-handler lock. Handles are cheap to clone and share one container set.
pub struct CacheHandler<P: CachePayload> {
    shared: Arc<HandlerShared<P>>,
}

impl<P: CachePayload> Clone for CacheHandler<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: CachePayload> CacheHandler<P> {
    pub(crate) fn new(manager: CacheManager) -> Self {
        let shared = Arc::new(HandlerShared {
            manager,
            inner: Mutex::new(Vec::new()),
        });
        let weak = Arc::downgrade(&shared);
        let weak: Weak<dyn EvictableShard> = weak;
        shared.manager.register_shard(weak);
        Self { shared }
    }

    /// Insert a payload for `range`, trimming or replacing any overlap so the
    /// container set stays disjoint and the newest write wins.
    ///
    /// A spilled container that would need trimming is dropped outright (its
    /// payload cannot be partially kept without a reload); the lost subrange
    /// is simply recomputed on demand.
    #[tracing::instrument(skip(self, payload))]
    pub fn add(&self, range: IndexRange, payload: P) {
        let mut removed_keys = Vec::<u64>::new();
        let mut delta = 0isize;
        {
            let Ok(mut inner) = self.shared.inner.lock() else {
                return;
            };
            let old = std::mem::take(&mut *inner);
            for mut c in old {
                if !c.range.overlaps(range) {
                    inner.push(c);
                    continue;
                }
                let covered = range.min <= c.range.min && c.range.max <= range.max;
                if covered || !c.is_resident() {
                    delta -= c.resident_size() as isize;
                    if !c.is_resident() {
                        removed_keys.push(c.spill_key);
                    }
                    continue;
                }
                // Resident partial overlap: keep the non-overlapping parts.
                if c.range.min < range.min && range.max < c.range.max {
                    if let PayloadState::Resident(p) = &c.state {
                        let right = CacheContainer::new_resident(
                            IndexRange {
                                min: range.max + 1,
                                max: c.range.max,
                            },
                            p.clone(),
                            c.last_used,
                            self.shared.manager.alloc_spill_key(),
                        );
                        delta += right.resident_size() as isize;
                        c.range.max = range.min - 1;
                        inner.push(c);
                        inner.push(right);
                    }
                } else if c.range.min < range.min {
                    c.range.max = range.min - 1;
                    inner.push(c);
                } else {
                    c.range.min = range.max + 1;
                    inner.push(c);
                }
            }

            delta += payload.size_bytes() as isize;
            inner.push(CacheContainer::new_resident(
                range,
                payload,
                self.shared.manager.tick(),
                self.shared.manager.alloc_spill_key(),
            ));
            inner.sort_by_key(|c| c.range.min);
        }

        let storage = self.shared.manager.storage();
        for key in removed_keys {
            storage.remove(key);
        }
        self.shared.manager.add_usage(delta);
    }

    /// Payload of the container covering `idx`, or `None`.
    ///
    /// A spilled container is synchronously reloaded and re-admitted under the
    /// budget. Reload failure is logged and treated as a miss: the container
    /// is dropped so the artifact gets recomputed from source.
    pub fn at(&self, idx: i64) -> Option<P> {
        let mut delta = 0isize;
        let mut dropped_key = None;
        let out;
        {
            let Ok(mut inner) = self.shared.inner.lock() else {
                return None;
            };
            let pos = Self::position(&inner, idx)?;
            let stamp = self.shared.manager.tick();
            let c = &mut inner[pos];
            c.last_used = stamp;
            match &c.state {
                PayloadState::Resident(p) => out = Some(p.clone()),
                PayloadState::Spilled { .. } => {
                    let reloaded = self
                        .shared
                        .manager
                        .storage()
                        .read(c.spill_key)
                        .and_then(|bytes| P::from_spill_bytes(&bytes));
                    match reloaded {
                        Ok(p) => {
                            delta = p.size_bytes() as isize;
                            c.state = PayloadState::Resident(p.clone());
                            out = Some(p);
                        }
                        Err(e) => {
                            tracing::warn!(idx, error = %e, "spill reload failed, dropping container");
                            dropped_key = Some(c.spill_key);
                            inner.remove(pos);
                            out = None;
                        }
                    }
                }
            }
        }

        if let Some(key) = dropped_key {
            self.shared.manager.storage().remove(key);
        }
        if delta != 0 {
            self.shared.manager.add_usage(delta);
        }
        out
    }

    /// Key-only query: whether a container (resident or spilled) covers `idx`.
    pub fn contains(&self, idx: i64) -> bool {
        self.shared
            .inner
            .lock()
            .map(|inner| Self::position(&inner, idx).is_some())
            .unwrap_or(false)
    }

    /// Whether the container covering `idx` is currently spilled.
    /// `None` when no container covers `idx`.
    pub fn is_spilled(&self, idx: i64) -> Option<bool> {
        let inner = self.shared.inner.lock().ok()?;
        let pos = Self::position(&inner, idx)?;
        Some(!inner[pos].is_resident())
    }

    /// Pin the container covering `idx` so it is not eligible for eviction
    /// until the returned guard drops.
    pub fn pin(&self, idx: i64) -> Option<CachePin<P>> {
        let mut inner = self.shared.inner.lock().ok()?;
        let pos = Self::position(&inner, idx)?;
        inner[pos].pins += 1;
        let spill_key = inner[pos].spill_key;
        Some(CachePin {
            shared: Arc::clone(&self.shared),
            spill_key,
        })
    }

    /// Total resident bytes currently eligible for eviction.
    pub fn evictable_size(&self) -> usize {
        self.shared
            .inner
            .lock()
            .map(|inner| {
                inner
                    .iter()
                    .filter(|c| c.evictable())
                    .map(|c| c.resident_size())
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Drop every container, releasing resident memory and spilled bytes.
    pub fn clear(&self) {
        let mut removed_keys = Vec::new();
        let mut delta = 0isize;
        if let Ok(mut inner) = self.shared.inner.lock() {
            for c in inner.drain(..) {
                delta -= c.resident_size() as isize;
                if !c.is_resident() {
                    removed_keys.push(c.spill_key);
                }
            }
        }
        let storage = self.shared.manager.storage();
        for key in removed_keys {
            storage.remove(key);
        }
        if delta != 0 {
            self.shared.manager.add_usage(delta);
        }
    }

    /// Number of containers currently held.
    pub fn len(&self) -> usize {
        self.shared.inner.lock().map(|i| i.len()).unwrap_or(0)
    }

    /// Whether the handler holds no containers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the (disjoint, sorted) container ranges.
    pub fn ranges(&self) -> Vec<IndexRange> {
        self.shared
            .inner
            .lock()
            .map(|inner| inner.iter().map(|c| c.range).collect())
            .unwrap_or_default()
    }

    fn position(inner: &[CacheContainer<P>], idx: i64) -> Option<usize> {
        let pos = inner.partition_point(|c| c.range.max < idx);
        if pos < inner.len() && inner[pos].range.contains(idx) {
            Some(pos)
        } else {
            None
        }
    }
}

impl<P: CachePayload> EvictableShard for HandlerShared<P> {
    fn oldest_unpinned(&self) -> Option<u64> {
        let inner = self.inner.lock().ok()?;
        inner
            .iter()
            .filter(|c| c.evictable())
            .map(|c| c.last_used)
            .min()
    }

    fn spill_oldest_unpinned(&self) -> usize {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        let Some(pos) = inner
            .iter()
            .enumerate()
            .filter(|(_, c)| c.evictable())
            .min_by_key(|(_, c)| c.last_used)
            .map(|(i, _)| i)
        else {
            return 0;
        };

        let c = &mut inner[pos];
        let PayloadState::Resident(p) = &c.state else {
            return 0;
        };
        let size = p.size_bytes();
        let spilled = p
            .to_spill_bytes()
            .and_then(|bytes| self.manager.storage().write(c.spill_key, bytes.as_slice()));
        match spilled {
            Ok(()) => {
                c.state = PayloadState::Spilled { size };
            }
            Err(e) => {
                // Never keep a container whose payload we can neither hold
                // nor restore; the range gets recomputed from source.
                tracing::warn!(error = %e, "spill write failed, dropping container");
                inner.remove(pos);
            }
        }
        size
    }
}

/// RAII guard keeping one cache container pinned in memory.
pub struct CachePin<P: CachePayload> {
    shared: Arc<HandlerShared<P>>,
    spill_key: u64,
}

impl<P: CachePayload> Drop for CachePin<P> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.shared.inner.lock()
            && let Some(c) = inner.iter_mut().find(|c| c.spill_key == self.spill_key)
        {
            c.pins = c.pins.saturating_sub(1);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/handler.rs"]
mod tests;
