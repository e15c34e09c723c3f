use std::sync::Weak;

use crate::{
    cache::handler::CachePin,
    foundation::{core::SampleRange, error::FramixResult},
    sound::{
        composition::CompositionShared,
        envelope::VolumeSnapshot,
        samples::{Samples, SamplesSlot},
    },
    task::task::Task,
};

/// One contributor to a merged output second: a decoded source buffer plus
/// the placement parameters mapping it onto the output timeline.
#[derive(Clone, Debug)]
pub struct SingleSoundData {
    /// Output sample position the source's sample 0 maps to.
    pub sample_shift: i64,
    /// Output samples this contributor actually covers (its clip window
    /// intersected with the merged second).
    pub abs_range: SampleRange,
    /// Source sample positions the buffer covers.
    pub buffer_range: SampleRange,
    /// Volume envelope over output sample positions.
    pub volume: VolumeSnapshot,
    /// Playback speed factor (> 0); 2.0 plays the source twice as fast.
    pub stretch: f64,
    /// The decoded source second, filled by a reader or a cache hit.
    pub samples: SamplesSlot,
}

/// Sum `data` into `out`, where `out[0]` is output sample `out_start`.
///
/// Each output sample inverse-maps through shift and stretch to a fractional
/// source position, linearly interpolated from the buffer and scaled by the
/// envelope. Positions outside the buffer contribute silence. Output is a
/// plain sum, deliberately unclamped: peak limiting belongs to whoever
/// consumes the mix.
pub(crate) fn mix_into(out: &mut [f32], out_start: i64, data: &SingleSoundData) {
    // An unfilled slot means the reader was canceled; contribute silence.
    let Some(samples) = data.samples.get() else {
        return;
    };
    if data.stretch <= 0.0 {
        return;
    }
    let buf = samples.data();
    for (i, out_sample) in out.iter_mut().enumerate() {
        let o = out_start + i as i64;
        if !data.abs_range.contains(o) {
            continue;
        }
        let src_pos = (o - data.sample_shift) as f64 / data.stretch;
        let rel = src_pos - data.buffer_range.min as f64;
        let lo = rel.floor();
        let frac = (rel - lo) as f32;
        let lo = lo as i64;
        let at = |idx: i64| -> f32 {
            if idx >= 0 && (idx as usize) < buf.len() {
                buf[idx as usize]
            } else {
                0.0
            }
        };
        let sample = at(lo) + (at(lo + 1) - at(lo)) * frac;
        *out_sample += sample * data.volume.value_at(o);
    }
}

/// Mixes every contributor of one output second into a single buffer.
///
/// Queued with dependencies on the reader tasks of not-yet-decoded source
/// seconds; cached contributors arrive pre-filled and pinned so eviction
/// cannot pull them away mid-merge. Contributors are summed in list order,
/// which makes the output deterministic for a given contributor list.
pub struct SoundMergeTask {
    second: i64,
    sample_rate: u32,
    contributors: Vec<SingleSoundData>,
    pins: Vec<CachePin<Samples>>,
    sink: Weak<CompositionShared>,
    result: Option<Samples>,
}

impl SoundMergeTask {
    pub(crate) fn new(
        second: i64,
        sample_rate: u32,
        contributors: Vec<SingleSoundData>,
        pins: Vec<CachePin<Samples>>,
        sink: Weak<CompositionShared>,
    ) -> Self {
        Self {
            second,
            sample_rate,
            contributors,
            pins,
            sink,
            result: None,
        }
    }

    /// The output second this task merges.
    pub fn second(&self) -> i64 {
        self.second
    }
}

impl Task for SoundMergeTask {
    fn process(&mut self) -> FramixResult<()> {
        let rate = i64::from(self.sample_rate);
        let mut out = vec![0.0f32; self.sample_rate as usize];
        let out_start = self.second * rate;
        for data in &self.contributors {
            mix_into(&mut out, out_start, data);
        }
        self.result = Some(Samples::new(self.sample_rate, out)?);
        Ok(())
    }

    fn after_processing(&mut self) {
        self.pins.clear();
        if let Some(shared) = self.sink.upgrade()
            && let Some(result) = self.result.take()
        {
            shared.second_finished(self.second, result);
        }
    }

    fn after_canceled(&mut self) {
        self.pins.clear();
        if let Some(shared) = self.sink.upgrade() {
            shared.second_canceled(self.second);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sound/merge.rs"]
mod tests;
