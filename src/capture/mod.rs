//! Capture orchestration
//!
//! This module provides the `CaptureSession` abstraction that manages:
//! - Both source pipelines (microphone and system audio)
//! - Lifecycle control (start/stop/pause/resume)
//! - Debounced restart on device-configuration changes
//! - The event channel consumed by the transcription layer

mod session;

pub use session::{ActiveSources, CaptureConfig, CaptureSession, CaptureState};

use thiserror::Error;

use crate::audio::{AudioChunk, SourceKind};

/// Per-source capture failure taxonomy.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// Device missing, busy, or permission denied. Fatal to the source.
    #[error("device unavailable: {0}")]
    Device(String),
    /// Per-chunk conversion failure. Recoverable; the chunk is dropped.
    #[error("format conversion failed: {0}")]
    Conversion(String),
    /// Fault reported by the underlying audio stream.
    #[error("stream fault: {0}")]
    Stream(String),
}

/// Events emitted by a capture session to its consumer.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// One converted chunk of canonical-format audio.
    Chunk(AudioChunk),
    /// A recoverable error scoped to one source. The other source keeps
    /// capturing; this component does not restart the failed pipeline.
    SourceError {
        source: SourceKind,
        error: CaptureError,
    },
    /// The active audio configuration changed for a source.
    DeviceChanged {
        source: SourceKind,
        device: Option<String>,
    },
    /// The session could not recover from a device change and stopped.
    Fatal(String),
}
