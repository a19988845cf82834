pub mod chunk;
pub mod converter;
pub mod device;
pub mod pipeline;
pub mod silence;

pub use chunk::{
    AudioChunk, SourceKind, CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE, CHUNK_WINDOW_MS,
    CHUNK_WINDOW_SAMPLES,
};
pub use converter::{ConvertError, FormatConverter};
pub use pipeline::{PipelineState, SourcePipeline};
pub use silence::{SilenceMonitor, SILENCE_RMS_THRESHOLD, SILENCE_SAMPLE_STRIDE};
