use serde::{Deserialize, Serialize};

/// Canonical stream format: 16 kHz mono 16-bit signed PCM.
pub const CANONICAL_SAMPLE_RATE: u32 = 16000;
pub const CANONICAL_CHANNELS: u16 = 1;

/// Capture window size per chunk, in milliseconds.
pub const CHUNK_WINDOW_MS: u64 = 100;

/// Samples per canonical-format chunk window.
pub const CHUNK_WINDOW_SAMPLES: usize =
    (CANONICAL_SAMPLE_RATE as u64 * CHUNK_WINDOW_MS / 1000) as usize;

/// Audio capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Local microphone input
    Microphone,
    /// Loopback/virtual device mirroring the machine's outgoing audio
    SystemAudio,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Microphone => "microphone",
            SourceKind::SystemAudio => "system-audio",
        }
    }
}

/// One window of canonical-format audio.
///
/// Chunks are immutable after creation and move (not share) between
/// pipeline stages. `timestamp_ms` is monotonic per source since the
/// owning pipeline started; chunks from different sources are not
/// globally ordered, consumers align them by timestamp.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub source: SourceKind,
    /// Little-endian 16-bit signed PCM bytes
    pub pcm: Vec<u8>,
    pub timestamp_ms: u64,
}

impl AudioChunk {
    /// Build a chunk from canonical-format samples.
    pub fn from_samples(source: SourceKind, samples: &[i16], timestamp_ms: u64) -> Self {
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self {
            source,
            pcm,
            timestamp_ms,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.pcm.len() / 2
    }

    pub fn duration_ms(&self) -> u64 {
        self.sample_count() as u64 * 1000 / CANONICAL_SAMPLE_RATE as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_from_samples_little_endian() {
        let chunk = AudioChunk::from_samples(SourceKind::Microphone, &[0x0102, -1], 0);

        assert_eq!(chunk.pcm, vec![0x02, 0x01, 0xFF, 0xFF]);
        assert_eq!(chunk.sample_count(), 2);
    }

    #[test]
    fn test_chunk_duration() {
        let samples = vec![0i16; CHUNK_WINDOW_SAMPLES];
        let chunk = AudioChunk::from_samples(SourceKind::SystemAudio, &samples, 500);

        assert_eq!(chunk.duration_ms(), CHUNK_WINDOW_MS);
        assert_eq!(chunk.timestamp_ms, 500);
    }
}
