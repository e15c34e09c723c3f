use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use crate::{
    cache::{handler::CacheHandler, handler::CachePin, manager::CacheManager},
    foundation::{
        core::{IndexRange, SampleRange, second_sample_range},
        error::{FramixError, FramixResult},
    },
    sound::{
        envelope::VolumeSnapshot,
        handler::SoundHandler,
        merge::{SingleSoundData, SoundMergeTask},
        samples::{Samples, SamplesSlot},
    },
    task::{scheduler::Scheduler, task::TaskHandle},
};

/// One audio clip placed on the output timeline.
#[derive(Clone)]
pub struct PlacedSound {
    /// Source handler (shared decode cache).
    pub handler: SoundHandler,
    /// Output sample position the source's sample 0 maps to.
    pub sample_shift: i64,
    /// Output samples the clip is audible over.
    pub abs_range: SampleRange,
    /// Volume envelope over output sample positions.
    pub volume: VolumeSnapshot,
    /// Playback speed factor, must be > 0.
    pub stretch: f64,
}

pub(crate) struct CompositionShared {
    cache: CacheHandler<Samples>,
    merging: Mutex<HashSet<i64>>,
}

impl CompositionShared {
    pub(crate) fn second_finished(&self, second: i64, samples: Samples) {
        if let Ok(mut merging) = self.merging.lock() {
            merging.remove(&second);
        }
        self.cache.add(IndexRange::single(second), samples);
    }

    pub(crate) fn second_canceled(&self, second: i64) {
        if let Ok(mut merging) = self.merging.lock() {
            merging.remove(&second);
        }
    }
}

/// The mixed output timeline: placed sounds in, merged seconds out.
///
/// `request_second` fans out reader tasks for the source seconds a merge
/// needs, queues the merge behind them, and caches the merged buffer when it
/// lands. Playback pulls finished seconds with [`SoundComposition::samples_at`].
pub struct SoundComposition {
    shared: Arc<CompositionShared>,
    sounds: Vec<PlacedSound>,
    sample_rate: u32,
}

impl SoundComposition {
    /// Empty composition mixing at `sample_rate`, budgeted by `manager`.
    pub fn new(manager: &CacheManager, sample_rate: u32) -> Self {
        Self {
            shared: Arc::new(CompositionShared {
                cache: manager.new_handler(),
                merging: Mutex::new(HashSet::new()),
            }),
            sounds: Vec::new(),
            sample_rate,
        }
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Place a sound on the timeline. Merge order (and so the exact mix)
    /// follows placement order.
    pub fn add_sound(&mut self, sound: PlacedSound) -> FramixResult<()> {
        if !sound.stretch.is_finite() || sound.stretch <= 0.0 {
            return Err(FramixError::audio("sound stretch must be finite and > 0"));
        }
        self.sounds.push(sound);
        Ok(())
    }

    /// Remove every placed sound; cached merged seconds are stale and dropped.
    pub fn clear_sounds(&mut self) {
        self.sounds.clear();
        self.shared.cache.clear();
    }

    /// Merged samples for `second`, if already mixed.
    pub fn samples_at(&self, second: i64) -> Option<Samples> {
        self.shared.cache.at(second)
    }

    /// Whether `second` is mixed and cached.
    pub fn contains(&self, second: i64) -> bool {
        self.shared.cache.contains(second)
    }

    /// Ensure `second` is (or will be) mixed.
    ///
    /// Queues the merge task behind reader tasks for every source second it
    /// needs; already-cached source seconds are pinned and consumed directly.
    /// Returns the merge handle, or `None` when the second is already cached
    /// or a merge for it is still in flight.
    #[tracing::instrument(skip(self, scheduler))]
    pub fn request_second(&self, scheduler: &mut Scheduler, second: i64) -> Option<TaskHandle> {
        if self.shared.cache.contains(second) {
            return None;
        }
        if let Ok(mut merging) = self.shared.merging.lock() {
            if !merging.insert(second) {
                return None;
            }
        }

        let out_range = second_sample_range(second, self.sample_rate);
        let mut contributors = Vec::<SingleSoundData>::new();
        let mut pins = Vec::<CachePin<Samples>>::new();
        let mut deps = Vec::<TaskHandle>::new();

        for sound in &self.sounds {
            let Some(needed) = out_range.intersection(sound.abs_range) else {
                continue;
            };
            if sound.handler.is_missing() {
                continue;
            }
            for src_second in source_seconds(needed, sound) {
                let Some(slot) =
                    self.resolve_source_second(sound, src_second, scheduler, &mut pins, &mut deps)
                else {
                    continue;
                };
                contributors.push(SingleSoundData {
                    sample_shift: sound.sample_shift,
                    abs_range: needed,
                    buffer_range: second_sample_range(src_second, sound.handler.sample_rate()),
                    volume: sound.volume.clone(),
                    stretch: sound.stretch,
                    samples: slot,
                });
            }
        }

        let task = SoundMergeTask::new(
            second,
            self.sample_rate,
            contributors,
            pins,
            Arc::downgrade(&self.shared),
        );
        Some(scheduler.queue_with_deps(Box::new(task), deps))
    }

    /// Slot holding (or about to hold) one source second: pinned cache hit,
    /// in-flight reader, or a freshly queued one.
    fn resolve_source_second(
        &self,
        sound: &PlacedSound,
        src_second: i64,
        scheduler: &mut Scheduler,
        pins: &mut Vec<CachePin<Samples>>,
        deps: &mut Vec<TaskHandle>,
    ) -> Option<SamplesSlot> {
        if let Some(pin) = sound.handler.pin_second(src_second) {
            if let Some(samples) = sound.handler.samples_for_second(src_second) {
                pins.push(pin);
                return Some(SamplesSlot::filled(samples));
            }
            // Reload failed under the pin; fall through to a fresh reader.
            drop(pin);
        }
        let (handle, slot) = sound.handler.request_second(scheduler, src_second)?;
        deps.push(handle);
        Some(slot)
    }
}

/// Source seconds whose samples can influence output range `needed`,
/// restricted to the seconds the source actually has. The extra trailing
/// sample accounts for interpolation reading one position ahead.
fn source_seconds(needed: SampleRange, sound: &PlacedSound) -> std::ops::RangeInclusive<i64> {
    let rate = i64::from(sound.handler.sample_rate());
    let lo = ((needed.min - sound.sample_shift) as f64 / sound.stretch).floor() as i64;
    let hi = ((needed.max - sound.sample_shift) as f64 / sound.stretch).floor() as i64 + 1;
    let first = lo.div_euclid(rate).max(0);
    let last = hi.div_euclid(rate).min(sound.handler.duration_secs() - 1);
    first..=last
}

#[cfg(test)]
#[path = "../../tests/unit/sound/composition.rs"]
mod tests;
