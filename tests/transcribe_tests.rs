// Wire-contract and drop-policy tests for the transcription session.

use parley::audio::{AudioChunk, SourceKind};
use parley::transcribe::{
    RecognizeResponse, StreamingConfig, TranscribeConfig, TranscribeState, TranscriptResult,
    TranscriptionSession,
};

#[test]
fn test_streaming_config_wire_shape() {
    let config = StreamingConfig::linear16("en-US");
    let json = serde_json::to_string(&config).unwrap();

    assert!(json.contains("\"encoding\":\"LINEAR16\""));
    assert!(json.contains("\"sampleRateHertz\":16000"));
    assert!(json.contains("\"languageCode\":\"en-US\""));
    assert!(json.contains("\"enableAutomaticPunctuation\":true"));
    assert!(json.contains("\"interimResults\":true"));
}

#[test]
fn test_transcript_uses_first_alternative_only() {
    let json = r#"{
        "results": [{
            "alternatives": [
                {"transcript": "recognize speech", "confidence": 0.92},
                {"transcript": "wreck a nice beach", "confidence": 0.31}
            ],
            "isFinal": true,
            "startTimeMs": 1200,
            "endTimeMs": 2800
        }]
    }"#;

    let response: RecognizeResponse = serde_json::from_str(json).unwrap();
    let result = TranscriptResult::from_response(&response).unwrap();

    assert_eq!(result.text, "recognize speech");
    assert!(result.is_final);
    assert!((result.confidence - 0.92).abs() < 1e-6);
    assert_eq!(result.source_range, (1200, 2800));
}

#[test]
fn test_interim_result_parses_without_confidence() {
    let json = r#"{
        "results": [{
            "alternatives": [{"transcript": "hello wor"}],
            "isFinal": false
        }]
    }"#;

    let response: RecognizeResponse = serde_json::from_str(json).unwrap();
    let result = TranscriptResult::from_response(&response).unwrap();

    assert_eq!(result.text, "hello wor");
    assert!(!result.is_final);
    assert_eq!(result.confidence, 0.0);
}

#[test]
fn test_empty_response_yields_no_transcript() {
    let response: RecognizeResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();

    assert!(TranscriptResult::from_response(&response).is_none());
}

#[tokio::test]
async fn test_writes_before_streaming_are_dropped_silently() {
    let mut session = TranscriptionSession::new(TranscribeConfig::default());
    assert_eq!(session.state(), TranscribeState::Idle);

    // Overlapping-timestamp chunks from both sources: both accepted by
    // the write path, both dropped while not streaming, no error.
    let mic = AudioChunk::from_samples(SourceKind::Microphone, &[1, 2, 3], 1000);
    let system = AudioChunk::from_samples(SourceKind::SystemAudio, &[4, 5, 6], 990);

    session.write_chunk(&mic).await.unwrap();
    session.write_chunk(&system).await.unwrap();

    assert_eq!(session.chunks_sent(), 0);
    assert_eq!(session.chunks_dropped(), 2);
    assert_eq!(session.state(), TranscribeState::Idle);
}

#[tokio::test]
async fn test_close_from_idle_reaches_closed() {
    let mut session = TranscriptionSession::new(TranscribeConfig::default());

    session.close().await;
    assert_eq!(session.state(), TranscribeState::Closed);

    // Idempotent
    session.close().await;
    assert_eq!(session.state(), TranscribeState::Closed);
}

#[tokio::test]
async fn test_reconnect_requires_errored_state() {
    let mut session = TranscriptionSession::new(TranscribeConfig::default());

    assert!(session.reconnect().await.is_err());
}
