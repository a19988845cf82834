pub mod audio;
pub mod capture;
pub mod config;
pub mod reasoning;
pub mod transcribe;

pub use audio::{
    AudioChunk, FormatConverter, SilenceMonitor, SourceKind, SourcePipeline,
    CANONICAL_SAMPLE_RATE,
};
pub use capture::{
    ActiveSources, CaptureConfig, CaptureError, CaptureEvent, CaptureSession, CaptureState,
};
pub use config::Config;
pub use reasoning::{
    CloudProvider, GenerationError, GenerationRequest, LocalProvider, ReasoningProvider,
    Responder, ResilientClient, RetryPolicy, APOLOGY_MESSAGE,
};
pub use transcribe::{
    TranscribeConfig, TranscribeEvent, TranscribeState, TranscriptResult, TranscriptionSession,
};
