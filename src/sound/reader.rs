use std::sync::Arc;

use crate::{
    foundation::error::FramixResult,
    sound::{
        handler::SoundDataHandler,
        samples::SamplesSlot,
        source::AudioSource,
    },
    task::task::Task,
};

/// Decodes one playback second of one audio source on a worker thread.
///
/// The decoded buffer lands in a [`SamplesSlot`] during `process` (merge
/// tasks depending on this reader pull it from there) and is published into
/// the handler's cache in `after_processing`. A canceled reader only clears
/// its in-flight registration.
pub struct SoundReaderTask {
    source: Arc<dyn AudioSource>,
    second: i64,
    slot: SamplesSlot,
    handler: SoundDataHandler,
}

impl SoundReaderTask {
    pub(crate) fn new(
        source: Arc<dyn AudioSource>,
        second: i64,
        slot: SamplesSlot,
        handler: SoundDataHandler,
    ) -> Self {
        Self {
            source,
            second,
            slot,
            handler,
        }
    }

    /// The playback second this reader decodes.
    pub fn second(&self) -> i64 {
        self.second
    }
}

impl Task for SoundReaderTask {
    fn process(&mut self) -> FramixResult<()> {
        let samples = self.source.decode_second(self.second)?;
        self.slot.set(samples);
        Ok(())
    }

    fn after_processing(&mut self) {
        if let Some(samples) = self.slot.get() {
            self.handler.second_decoded(self.second, samples);
        } else {
            self.handler.second_canceled(self.second);
        }
    }

    fn after_canceled(&mut self) {
        self.handler.second_canceled(self.second);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sound/reader.rs"]
mod tests;
