use crate::foundation::error::{FramixError, FramixResult};

/// Immutable piecewise-linear volume envelope over absolute sample positions.
///
/// Snapshotted from animated volume state at queue time so a merge task never
/// reads live animation data. Positions outside the point span clamp to the
/// nearest endpoint gain.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSnapshot {
    /// `(absolute sample position, gain)` points, strictly increasing by
    /// position.
    points: Vec<(i64, f32)>,
}

impl VolumeSnapshot {
    /// Flat envelope at `gain`.
    pub fn constant(gain: f32) -> Self {
        Self {
            points: vec![(0, gain)],
        }
    }

    /// Envelope through `points`; positions must be strictly increasing.
    pub fn from_points(points: Vec<(i64, f32)>) -> FramixResult<Self> {
        if points.is_empty() {
            return Err(FramixError::audio("volume envelope needs at least one point"));
        }
        for pair in points.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(FramixError::audio(
                    "volume envelope positions must be strictly increasing",
                ));
            }
        }
        Ok(Self { points })
    }

    /// Gain at absolute sample position `pos`.
    pub fn value_at(&self, pos: i64) -> f32 {
        let first = self.points[0];
        if pos <= first.0 {
            return first.1;
        }
        let last = self.points[self.points.len() - 1];
        if pos >= last.0 {
            return last.1;
        }
        // pos is strictly inside the span, so a bracketing pair exists.
        let hi = self.points.partition_point(|&(p, _)| p < pos);
        let (p0, g0) = self.points[hi - 1];
        let (p1, g1) = self.points[hi];
        let t = (pos - p0) as f32 / (p1 - p0) as f32;
        g0 + (g1 - g0) * t
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sound/envelope.rs"]
mod tests;
