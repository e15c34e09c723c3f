use crate::foundation::error::{FramixError, FramixResult};

/// A frame index in a node's local time base, before any time-remapping.
///
/// Relative frames may be negative (a node can start before its parent's
/// origin), so this is a signed index unlike an absolute output frame.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct RelFrame(pub i64);

/// Inclusive contiguous integer range used as a cache key.
///
/// Keys frames for rendered-image caches and playback seconds for audio
/// caches. Both bounds are part of the range (`min..=max`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct IndexRange {
    /// First index covered.
    pub min: i64,
    /// Last index covered.
    pub max: i64,
}

impl IndexRange {
    /// Build a range, failing fast on `min > max`.
    pub fn new(min: i64, max: i64) -> FramixResult<Self> {
        if min > max {
            return Err(FramixError::validation("IndexRange min must be <= max"));
        }
        Ok(Self { min, max })
    }

    /// Range covering exactly one index.
    pub fn single(idx: i64) -> Self {
        Self { min: idx, max: idx }
    }

    /// Number of indices covered.
    pub fn span(self) -> u64 {
        (self.max - self.min) as u64 + 1
    }

    /// Whether `idx` falls inside the range.
    pub fn contains(self, idx: i64) -> bool {
        self.min <= idx && idx <= self.max
    }

    /// Whether the two ranges share at least one index.
    pub fn overlaps(self, other: IndexRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Intersection of the two ranges, or `None` when disjoint.
    pub fn intersection(self, other: IndexRange) -> Option<IndexRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min > max {
            return None;
        }
        Some(Self { min, max })
    }
}

/// Inclusive absolute sample range at the engine sample rate.
pub type SampleRange = IndexRange;

/// Sample range covering one whole playback second.
pub fn second_sample_range(second: i64, sample_rate: u32) -> SampleRange {
    let rate = i64::from(sample_rate);
    IndexRange {
        min: second * rate,
        max: (second + 1) * rate - 1,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
