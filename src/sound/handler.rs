use std::sync::{Arc, Mutex};

use crate::{
    cache::{handler::CacheHandler, handler::CachePin, manager::CacheManager},
    foundation::core::IndexRange,
    sound::{
        reader::SoundReaderTask,
        samples::{Samples, SamplesSlot},
        source::{AudioSource, FileAudioSource},
    },
    task::{scheduler::Scheduler, task::TaskHandle},
};

struct SecondReader {
    second: i64,
    handle: TaskHandle,
    slot: SamplesSlot,
}

struct DataShared {
    cache: CacheHandler<Samples>,
    /// Seconds currently being decoded, parallel to the cache: a second is
    /// either cached, being read, or absent, never two at once.
    readers: Mutex<Vec<SecondReader>>,
}

/// Decoded-audio cache for one source, keyed by playback second.
///
/// Shares the container set across clones; reader tasks hold a clone to
/// publish their result back.
pub struct SoundDataHandler {
    shared: Arc<DataShared>,
}

impl Clone for SoundDataHandler {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl SoundDataHandler {
    /// New handler budgeted by `manager`.
    pub fn new(manager: &CacheManager) -> Self {
        Self {
            shared: Arc::new(DataShared {
                cache: manager.new_handler(),
                readers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cached samples for `second`, reloading a spilled container.
    pub fn at(&self, second: i64) -> Option<Samples> {
        self.shared.cache.at(second)
    }

    /// Whether `second` is cached (resident or spilled).
    pub fn contains(&self, second: i64) -> bool {
        self.shared.cache.contains(second)
    }

    /// Pin `second` against eviction.
    pub fn pin(&self, second: i64) -> Option<CachePin<Samples>> {
        self.shared.cache.pin(second)
    }

    /// Whether a reader task for `second` is in flight.
    pub fn is_reading(&self, second: i64) -> bool {
        self.shared
            .readers
            .lock()
            .map(|r| r.iter().any(|sr| sr.second == second))
            .unwrap_or(false)
    }

    /// Drop every cached second.
    pub fn clear(&self) {
        self.shared.cache.clear();
    }

    pub(crate) fn reading(&self, second: i64) -> Option<(TaskHandle, SamplesSlot)> {
        let readers = self.shared.readers.lock().ok()?;
        readers
            .iter()
            .find(|sr| sr.second == second)
            .map(|sr| (sr.handle.clone(), sr.slot.clone()))
    }

    pub(crate) fn register_reader(&self, second: i64, handle: TaskHandle, slot: SamplesSlot) {
        if let Ok(mut readers) = self.shared.readers.lock() {
            readers.push(SecondReader {
                second,
                handle,
                slot,
            });
        }
    }

    pub(crate) fn second_decoded(&self, second: i64, samples: Samples) {
        self.remove_reader(second);
        self.shared.cache.add(IndexRange::single(second), samples);
    }

    pub(crate) fn second_canceled(&self, second: i64) {
        self.remove_reader(second);
    }

    fn remove_reader(&self, second: i64) {
        if let Ok(mut readers) = self.shared.readers.lock() {
            readers.retain(|sr| sr.second != second);
        }
    }
}

/// One audio source with its decode cache and reader bookkeeping.
///
/// A handler whose file could not be opened is "missing": it yields silent
/// seconds and never spawns readers, so a broken path degrades playback
/// instead of failing it.
#[derive(Clone)]
pub struct SoundHandler {
    source: Option<Arc<dyn AudioSource>>,
    data: SoundDataHandler,
    sample_rate: u32,
}

impl SoundHandler {
    /// Handler over an already-open source.
    pub fn from_source(source: Arc<dyn AudioSource>, manager: &CacheManager) -> Self {
        Self {
            sample_rate: source.sample_rate(),
            source: Some(source),
            data: SoundDataHandler::new(manager),
        }
    }

    /// Handler for a source that could not be opened.
    pub fn missing(sample_rate: u32, manager: &CacheManager) -> Self {
        Self {
            source: None,
            data: SoundDataHandler::new(manager),
            sample_rate,
        }
    }

    /// Open `path` as raw f32le audio; an open failure is logged and yields a
    /// missing handler.
    pub fn open_file(
        path: impl AsRef<std::path::Path>,
        sample_rate: u32,
        manager: &CacheManager,
    ) -> Self {
        match FileAudioSource::open(path.as_ref(), sample_rate) {
            Ok(source) => Self::from_source(Arc::new(source), manager),
            Err(e) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "audio source open failed, treating as missing"
                );
                Self::missing(sample_rate, manager)
            }
        }
    }

    /// Whether the source failed to open.
    pub fn is_missing(&self) -> bool {
        self.source.is_none()
    }

    /// Source sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whole seconds the source covers; a missing source covers none.
    pub fn duration_secs(&self) -> i64 {
        self.source.as_ref().map_or(0, |s| s.duration_secs())
    }

    /// The decode cache.
    pub fn data(&self) -> &SoundDataHandler {
        &self.data
    }

    /// Samples for `second` if immediately available: silence for a missing
    /// source, otherwise a cache hit.
    pub fn samples_for_second(&self, second: i64) -> Option<Samples> {
        if self.source.is_none() {
            return Some(Samples::silence(self.sample_rate));
        }
        self.data.at(second)
    }

    /// Pin the cached container for `second` against eviction.
    pub fn pin_second(&self, second: i64) -> Option<CachePin<Samples>> {
        self.data.pin(second)
    }

    /// Ensure `second` is (or will be) decoded.
    ///
    /// Returns the in-flight reader's handle and slot when decoding is
    /// needed; `None` when the second is already cached or the source is
    /// missing.
    pub fn request_second(
        &self,
        scheduler: &mut Scheduler,
        second: i64,
    ) -> Option<(TaskHandle, SamplesSlot)> {
        let source = self.source.as_ref()?;
        if let Some(existing) = self.data.reading(second) {
            return Some(existing);
        }
        if self.data.contains(second) {
            return None;
        }

        let slot = SamplesSlot::new();
        let task = SoundReaderTask::new(
            Arc::clone(source),
            second,
            slot.clone(),
            self.data.clone(),
        );
        let handle = scheduler.queue(Box::new(task));
        self.data.register_reader(second, handle.clone(), slot.clone());
        Some((handle, slot))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sound/handler.rs"]
mod tests;
