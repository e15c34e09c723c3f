use crate::foundation::{core::IndexRange, error::FramixResult};

/// Payload stored in a cache container.
///
/// Payloads must survive a spill round trip: `from_spill_bytes(to_spill_bytes())`
/// has to reproduce an observationally equal value, or `from_spill_bytes` must
/// error (the handler then treats the container as a miss, never as corrupted
/// data).
pub trait CachePayload: Clone + Send + Sync + 'static {
    /// Estimated resident memory footprint in bytes.
    fn size_bytes(&self) -> usize;

    /// Serialize for spill to secondary storage.
    fn to_spill_bytes(&self) -> FramixResult<Vec<u8>>;

    /// Rebuild from previously spilled bytes.
    fn from_spill_bytes(bytes: &[u8]) -> FramixResult<Self>;
}

#[derive(Debug)]
pub(crate) enum PayloadState<P> {
    Resident(P),
    /// Payload freed; `size` remembers the resident estimate for bookkeeping.
    Spilled { size: usize },
}

/// One range-keyed cache entry, owned by a handler.
///
/// Immutable once finalized: a newer `add` for an overlapping range replaces
/// or trims this container instead of editing its payload.
#[derive(Debug)]
pub(crate) struct CacheContainer<P> {
    pub(crate) range: IndexRange,
    pub(crate) state: PayloadState<P>,
    pub(crate) last_used: u64,
    pub(crate) pins: u32,
    pub(crate) spill_key: u64,
}

impl<P: CachePayload> CacheContainer<P> {
    pub(crate) fn new_resident(range: IndexRange, payload: P, stamp: u64, spill_key: u64) -> Self {
        Self {
            range,
            state: PayloadState::Resident(payload),
            last_used: stamp,
            pins: 0,
            spill_key,
        }
    }

    pub(crate) fn is_resident(&self) -> bool {
        matches!(self.state, PayloadState::Resident(_))
    }

    pub(crate) fn resident_size(&self) -> usize {
        match &self.state {
            PayloadState::Resident(p) => p.size_bytes(),
            PayloadState::Spilled { .. } => 0,
        }
    }

    pub(crate) fn evictable(&self) -> bool {
        self.pins == 0 && self.is_resident()
    }
}
