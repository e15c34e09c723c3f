use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;

use crate::{
    foundation::error::{FramixError, FramixResult},
    sound::samples::Samples,
};

/// Decodable audio source, addressed second by second.
///
/// Sources are fixed-rate mono; resampling and stretching happen downstream
/// in the merge stage.
pub trait AudioSource: Send + Sync {
    /// Native sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of whole seconds the source covers (last one possibly partial,
    /// zero-padded on decode).
    fn duration_secs(&self) -> i64;

    /// Decode second `second` into a full buffer. Seconds outside the source
    /// decode as silence.
    fn decode_second(&self, second: i64) -> FramixResult<Samples>;
}

/// In-memory audio source backed by a sample vector.
pub struct MemoryAudioSource {
    rate: u32,
    data: Arc<Vec<f32>>,
}

impl MemoryAudioSource {
    /// Source over `data` at `rate` Hz.
    pub fn new(rate: u32, data: Vec<f32>) -> FramixResult<Self> {
        if rate == 0 {
            return Err(FramixError::audio("sample rate must be > 0"));
        }
        Ok(Self {
            rate,
            data: Arc::new(data),
        })
    }
}

impl AudioSource for MemoryAudioSource {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn duration_secs(&self) -> i64 {
        (self.data.len() as i64 + i64::from(self.rate) - 1) / i64::from(self.rate)
    }

    fn decode_second(&self, second: i64) -> FramixResult<Samples> {
        let rate = self.rate as usize;
        if second < 0 || second >= self.duration_secs() {
            return Ok(Samples::silence(self.rate));
        }
        let start = second as usize * rate;
        let end = (start + rate).min(self.data.len());
        let mut buf = vec![0.0f32; rate];
        buf[..end - start].copy_from_slice(&self.data[start..end]);
        Samples::new(self.rate, buf)
    }
}

/// Audio source reading raw mono f32le samples from a file.
///
/// The file length is captured at open time; decoding reopens the file per
/// second so the source stays shareable across reader tasks without interior
/// locking.
pub struct FileAudioSource {
    path: PathBuf,
    rate: u32,
    total_samples: u64,
}

impl FileAudioSource {
    /// Open `path` as raw f32le at `rate` Hz, failing fast when the file is
    /// absent or not sample-aligned.
    pub fn open(path: impl AsRef<Path>, rate: u32) -> FramixResult<Self> {
        if rate == 0 {
            return Err(FramixError::audio("sample rate must be > 0"));
        }
        let path = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&path)
            .with_context(|| format!("open audio file {}", path.display()))?;
        if meta.len() % 4 != 0 {
            return Err(FramixError::audio(format!(
                "audio file {} is not f32-aligned",
                path.display()
            )));
        }
        Ok(Self {
            total_samples: meta.len() / 4,
            path,
            rate,
        })
    }
}

impl AudioSource for FileAudioSource {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn duration_secs(&self) -> i64 {
        (self.total_samples as i64 + i64::from(self.rate) - 1) / i64::from(self.rate)
    }

    fn decode_second(&self, second: i64) -> FramixResult<Samples> {
        let rate = self.rate as usize;
        if second < 0 || second >= self.duration_secs() {
            return Ok(Samples::silence(self.rate));
        }
        let start = second as u64 * self.rate as u64;
        let avail = (self.total_samples - start).min(self.rate as u64) as usize;

        let mut file = File::open(&self.path)
            .with_context(|| format!("reopen audio file {}", self.path.display()))?;
        file.seek(SeekFrom::Start(start * 4))
            .context("seek audio file")?;
        let mut bytes = vec![0u8; avail * 4];
        file.read_exact(&mut bytes).context("read audio second")?;

        let mut buf = vec![0.0f32; rate];
        for (dst, c) in buf.iter_mut().zip(bytes.chunks_exact(4)) {
            *dst = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        }
        Samples::new(self.rate, buf)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sound/source.rs"]
mod tests;
