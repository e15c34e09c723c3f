use std::sync::{Arc, Mutex};

use crate::{
    cache::container::CachePayload,
    foundation::error::{FramixError, FramixResult},
};

/// Exactly one second of mono f32 audio at a fixed sample rate.
///
/// Audio flows through the engine in whole-second units; the fixed size keeps
/// cache keys, reader tasks, and merge output aligned on the same grid.
/// Cloning is cheap, the sample buffer is shared.
#[derive(Clone, Debug, PartialEq)]
pub struct Samples {
    rate: u32,
    data: Arc<Vec<f32>>,
}

impl Samples {
    /// Wrap a buffer holding exactly `rate` samples.
    pub fn new(rate: u32, data: Vec<f32>) -> FramixResult<Self> {
        if rate == 0 {
            return Err(FramixError::audio("sample rate must be > 0"));
        }
        if data.len() != rate as usize {
            return Err(FramixError::audio(format!(
                "second buffer holds {} samples, expected {rate}",
                data.len()
            )));
        }
        Ok(Self {
            rate,
            data: Arc::new(data),
        })
    }

    /// One second of silence.
    pub fn silence(rate: u32) -> Self {
        Self {
            rate,
            data: Arc::new(vec![0.0; rate as usize]),
        }
    }

    /// Sample rate in Hz; also the buffer length.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// The raw sample buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Sample at `idx` within the second; out of range is a contract
    /// violation.
    pub fn get(&self, idx: usize) -> FramixResult<f32> {
        self.data.get(idx).copied().ok_or_else(|| {
            FramixError::audio(format!(
                "sample index {idx} out of range for a {}-sample second",
                self.rate
            ))
        })
    }
}

/// Spill format: 4-byte LE sample rate header, then raw f32le samples.
impl CachePayload for Samples {
    fn size_bytes(&self) -> usize {
        self.data.len() * 4
    }

    fn to_spill_bytes(&self) -> FramixResult<Vec<u8>> {
        let mut out = Vec::with_capacity(4 + self.data.len() * 4);
        out.extend_from_slice(&self.rate.to_le_bytes());
        for s in self.data.iter() {
            out.extend_from_slice(&s.to_le_bytes());
        }
        Ok(out)
    }

    fn from_spill_bytes(bytes: &[u8]) -> FramixResult<Self> {
        if bytes.len() < 4 {
            return Err(FramixError::cache("spilled samples header truncated"));
        }
        let rate = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let body = &bytes[4..];
        if body.len() != rate as usize * 4 {
            return Err(FramixError::cache(
                "spilled samples length disagrees with header rate",
            ));
        }
        let data = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Samples::new(rate, data)
    }
}

/// Shared, late-filled slot for one decoded second.
///
/// A reader task fills the slot on a worker thread; the merge task that
/// depends on it reads the slot once the scheduler has resolved the
/// dependency.
#[derive(Clone, Default)]
pub struct SamplesSlot {
    inner: Arc<Mutex<Option<Samples>>>,
}

impl SamplesSlot {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot already holding `samples` (cache hits skip the reader).
    pub fn filled(samples: Samples) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(samples))),
        }
    }

    /// Store the decoded second.
    pub fn set(&self, samples: Samples) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner = Some(samples);
        }
    }

    /// Current contents, if decoded.
    pub fn get(&self) -> Option<Samples> {
        self.inner.lock().ok().and_then(|inner| inner.clone())
    }
}

impl std::fmt::Debug for SamplesSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplesSlot")
            .field("filled", &self.get().is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sound/samples.rs"]
mod tests;
