use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::foundation::core::RelFrame;

/// Authoritativeness token for one in-flight render.
///
/// Queuing a newer render for the same frame flips the older task's token, so
/// the superseded task completes normally but skips notifying the node.
#[derive(Clone)]
pub struct RenderStamp {
    token: Arc<AtomicBool>,
}

impl RenderStamp {
    /// Stamp that is never superseded; for renders outside any pending set.
    pub fn detached() -> Self {
        Self {
            token: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether this render is still the authoritative one for its frame.
    pub fn is_authoritative(&self) -> bool {
        self.token.load(Ordering::Acquire)
    }

    fn supersede(&self) {
        self.token.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for RenderStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderStamp")
            .field("authoritative", &self.is_authoritative())
            .finish()
    }
}

/// Per-node registry of in-flight renders, keyed by relative frame.
///
/// At most one render is authoritative per frame: `begin` for an
/// already-pending frame supersedes the previous stamp instead of racing it.
#[derive(Default)]
pub struct PendingRenders {
    inner: Mutex<HashMap<i64, RenderStamp>>,
}

impl PendingRenders {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new in-flight render for `rel_frame`, superseding any
    /// previous one for the same frame.
    pub fn begin(&self, rel_frame: RelFrame) -> RenderStamp {
        let stamp = RenderStamp::detached();
        if let Ok(mut inner) = self.inner.lock()
            && let Some(prev) = inner.insert(rel_frame.0, stamp.clone())
        {
            prev.supersede();
        }
        stamp
    }

    /// Clear the pending marker for `rel_frame` (render arrived or the node
    /// gave up on it).
    pub fn clear(&self, rel_frame: RelFrame) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.remove(&rel_frame.0);
        }
    }

    /// Whether a render is currently pending for `rel_frame`.
    pub fn is_pending(&self, rel_frame: RelFrame) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.contains_key(&rel_frame.0))
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/pending.rs"]
mod tests;
