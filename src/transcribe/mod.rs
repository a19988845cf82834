//! Streaming transcription
//!
//! One long-lived stream to the recognition service per session: the
//! streaming configuration goes out once at creation, audio chunks
//! follow, and parsed transcript events come back on an event channel.

pub mod messages;
mod session;

pub use messages::{
    AudioFrameMessage, RecognizeAlternative, RecognizeResponse, RecognizeResult, StreamingConfig,
    TranscriptResult,
};
pub use session::{TranscribeConfig, TranscribeEvent, TranscribeState, TranscriptionSession};
