use serde::{Deserialize, Serialize};

use crate::audio::CANONICAL_SAMPLE_RATE;

/// Streaming configuration sent once at stream creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingConfig {
    pub encoding: String,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub enable_automatic_punctuation: bool,
    pub interim_results: bool,
}

impl StreamingConfig {
    /// Canonical-format configuration for a language.
    pub fn linear16(language_code: &str) -> Self {
        Self {
            encoding: "LINEAR16".to_string(),
            sample_rate_hertz: CANONICAL_SAMPLE_RATE,
            language_code: language_code.to_string(),
            enable_automatic_punctuation: true,
            interim_results: true,
        }
    }
}

/// Audio frame envelope published to the recognition stream
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u64,
    /// Source tag ("microphone" | "system-audio")
    pub source: String,
    /// Base64-encoded PCM bytes
    pub pcm: String,
    /// Capture timestamp in milliseconds since the source started
    pub timestamp_ms: u64,
    /// RFC3339 send timestamp
    pub sent_at: String,
}

/// One ranked transcription hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizeAlternative {
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// One recognized utterance (interim or final).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeResult {
    pub alternatives: Vec<RecognizeAlternative>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub start_time_ms: u64,
    #[serde(default)]
    pub end_time_ms: u64,
}

/// Inbound message from the recognition service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub results: Vec<RecognizeResult>,
}

/// A parsed transcript event.
///
/// Interim results (`is_final == false`) are provisional and are
/// superseded by later interim results for the same utterance; a final
/// result closes the utterance out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub is_final: bool,
    pub confidence: f32,
    /// Source timestamp range (start_ms, end_ms) covered by this text
    pub source_range: (u64, u64),
}

impl TranscriptResult {
    /// Parse a service response. Recognition services rank their
    /// alternatives; only the first (rank 0) of the first result is
    /// authoritative here.
    pub fn from_response(response: &RecognizeResponse) -> Option<Self> {
        let result = response.results.first()?;
        let alternative = result.alternatives.first()?;

        Some(Self {
            text: alternative.transcript.clone(),
            is_final: result.is_final,
            confidence: alternative.confidence,
            source_range: (result.start_time_ms, result.end_time_ms),
        })
    }
}
