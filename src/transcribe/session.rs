use anyhow::{bail, Context, Result};
use base64::Engine;
use futures::stream::StreamExt;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{AudioFrameMessage, RecognizeResponse, StreamingConfig, TranscriptResult};
use crate::audio::AudioChunk;

/// Transcription session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscribeState {
    Idle,
    Connecting,
    Streaming,
    Closing,
    Closed,
    /// Reached from `Streaming` on a stream fault; a caller-driven
    /// `reconnect()` returns to `Streaming`, `close()` to `Closed`.
    Errored,
}

/// Events delivered to the transcript consumer.
#[derive(Debug, Clone)]
pub enum TranscribeEvent {
    Result(TranscriptResult),
    /// Stream error surfaced to the caller; this session does not
    /// reconnect on its own. Recognition connectivity and generation
    /// calls have different cost/latency tradeoffs, so their resilience
    /// policies stay separate.
    Error(String),
    Closed,
}

/// Configuration for a transcription session
#[derive(Debug, Clone)]
pub struct TranscribeConfig {
    pub nats_url: String,
    pub session_id: String,
    pub language_code: String,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            language_code: "en-US".to_string(),
        }
    }
}

/// One long-lived bidirectional stream to the recognition service.
///
/// The streaming configuration is published once at stream creation;
/// audio chunks follow as they arrive. Writes while not `Streaming` are
/// silently dropped (bounded counter, no queueing), keeping them cheap
/// no-ops until the caller reconnects.
pub struct TranscriptionSession {
    config: TranscribeConfig,
    /// Shared with the inbound subscriber task, which marks the session
    /// errored when the result stream dies out from under it.
    state: Arc<StdMutex<TranscribeState>>,
    client: Option<async_nats::Client>,
    events_tx: Option<mpsc::Sender<TranscribeEvent>>,
    inbound: Option<JoinHandle<()>>,
    sequence: u64,
    chunks_sent: u64,
    chunks_dropped: u64,
}

impl TranscriptionSession {
    pub fn new(config: TranscribeConfig) -> Self {
        Self {
            config,
            state: Arc::new(StdMutex::new(TranscribeState::Idle)),
            client: None,
            events_tx: None,
            inbound: None,
            sequence: 0,
            chunks_sent: 0,
            chunks_dropped: 0,
        }
    }

    pub fn state(&self) -> TranscribeState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: TranscribeState) {
        *self.state.lock().unwrap() = next;
    }

    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    pub fn chunks_dropped(&self) -> u64 {
        self.chunks_dropped
    }

    fn config_subject(&self) -> String {
        format!("stt.session.{}.config", self.config.session_id)
    }

    fn audio_subject(&self) -> String {
        format!("stt.audio.{}", self.config.session_id)
    }

    fn results_subject(&self) -> String {
        format!("stt.results.{}", self.config.session_id)
    }

    /// Open the stream: connect, send the streaming configuration, and
    /// subscribe to results. Returns the event channel for this session.
    pub async fn connect(&mut self) -> Result<mpsc::Receiver<TranscribeEvent>> {
        if self.state() != TranscribeState::Idle {
            bail!("Transcription session already connected");
        }

        let (events_tx, events_rx) = mpsc::channel(256);
        self.events_tx = Some(events_tx);

        self.open_stream().await?;

        Ok(events_rx)
    }

    /// Caller-driven reconnect after a stream error.
    pub async fn reconnect(&mut self) -> Result<()> {
        if self.state() != TranscribeState::Errored {
            bail!("Reconnect is only valid from the errored state");
        }

        if let Some(inbound) = self.inbound.take() {
            inbound.abort();
        }
        self.client = None;

        self.open_stream().await
    }

    async fn open_stream(&mut self) -> Result<()> {
        let events_tx = self
            .events_tx
            .clone()
            .context("Session has no event channel")?;

        self.set_state(TranscribeState::Connecting);
        info!(
            "Connecting recognition stream: {} ({})",
            self.config.session_id, self.config.nats_url
        );

        let client = match async_nats::connect(&self.config.nats_url).await {
            Ok(client) => client,
            Err(e) => {
                self.set_state(TranscribeState::Idle);
                return Err(e).context("Failed to connect to recognition service");
            }
        };

        // Streaming configuration goes out exactly once per stream.
        let streaming_config = StreamingConfig::linear16(&self.config.language_code);
        let payload = serde_json::to_vec(&streaming_config)?;
        client
            .publish(self.config_subject(), payload.into())
            .await
            .context("Failed to publish streaming configuration")?;

        let mut subscriber = client
            .subscribe(self.results_subject())
            .await
            .context("Failed to subscribe to recognition results")?;

        let state = Arc::clone(&self.state);
        self.inbound = Some(tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<RecognizeResponse>(&msg.payload) {
                    Ok(response) => {
                        // Rank 0 alternative only.
                        if let Some(result) = TranscriptResult::from_response(&response) {
                            if events_tx
                                .send(TranscribeEvent::Result(result))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse recognition response: {}", e);
                    }
                }
            }

            mark_stream_ended(&state, &events_tx);
        }));

        self.client = Some(client);
        self.set_state(TranscribeState::Streaming);

        info!("Recognition stream open: {}", self.config.session_id);

        Ok(())
    }

    /// Push one audio chunk onto the stream.
    ///
    /// Never raises on a non-ready stream: the chunk is dropped and
    /// counted, and a publish failure marks the session errored so
    /// subsequent writes are cheap no-ops until `reconnect()`.
    pub async fn write_chunk(&mut self, chunk: &AudioChunk) -> Result<()> {
        if self.state() != TranscribeState::Streaming {
            self.chunks_dropped += 1;
            debug!(
                "Dropped {} chunk (session not streaming, {} dropped)",
                chunk.source.label(),
                self.chunks_dropped
            );
            return Ok(());
        }

        let Some(client) = &self.client else {
            self.chunks_dropped += 1;
            return Ok(());
        };

        let message = AudioFrameMessage {
            session_id: self.config.session_id.clone(),
            sequence: self.sequence,
            source: chunk.source.label().to_string(),
            pcm: base64::engine::general_purpose::STANDARD.encode(&chunk.pcm),
            timestamp_ms: chunk.timestamp_ms,
            sent_at: chrono::Utc::now().to_rfc3339(),
        };
        let payload = serde_json::to_vec(&message)?;

        match client.publish(self.audio_subject(), payload.into()).await {
            Ok(()) => {
                self.sequence += 1;
                self.chunks_sent += 1;
            }
            Err(e) => {
                warn!("Recognition stream write failed: {}", e);
                self.chunks_dropped += 1;
                self.set_state(TranscribeState::Errored);
                if let Some(events_tx) = &self.events_tx {
                    let _ = events_tx.try_send(TranscribeEvent::Error(e.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Close the stream and release the connection.
    pub async fn close(&mut self) {
        if self.state() == TranscribeState::Closed {
            return;
        }
        self.set_state(TranscribeState::Closing);

        if let Some(inbound) = self.inbound.take() {
            inbound.abort();
        }
        self.client = None;

        if let Some(events_tx) = &self.events_tx {
            let _ = events_tx.try_send(TranscribeEvent::Closed);
        }

        self.set_state(TranscribeState::Closed);
        info!(
            "Recognition stream closed: {} ({} chunks sent, {} dropped)",
            self.config.session_id, self.chunks_sent, self.chunks_dropped
        );
    }
}

/// Inbound-task epilogue: the result stream died. A session still
/// streaming becomes errored so the caller's `reconnect()` is permitted;
/// a session already closing keeps its state.
fn mark_stream_ended(
    state: &StdMutex<TranscribeState>,
    events_tx: &mpsc::Sender<TranscribeEvent>,
) {
    {
        let mut st = state.lock().unwrap();
        if *st != TranscribeState::Streaming {
            return;
        }
        *st = TranscribeState::Errored;
    }

    warn!("Recognition result stream ended");
    let _ = events_tx.try_send(TranscribeEvent::Error(
        "Recognition result stream ended".to_string(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_end_marks_session_errored() {
        let session = TranscriptionSession::new(TranscribeConfig::default());
        let (events_tx, mut events_rx) = mpsc::channel(8);
        session.set_state(TranscribeState::Streaming);

        mark_stream_ended(&session.state, &events_tx);

        assert_eq!(session.state(), TranscribeState::Errored);
        assert!(matches!(
            events_rx.try_recv(),
            Ok(TranscribeEvent::Error(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_end_during_close_keeps_state() {
        let session = TranscriptionSession::new(TranscribeConfig::default());
        let (events_tx, mut events_rx) = mpsc::channel(8);
        session.set_state(TranscribeState::Closing);

        mark_stream_ended(&session.state, &events_tx);

        assert_eq!(session.state(), TranscribeState::Closing);
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnect_permitted_after_stream_fault() {
        // An unroutable port: the reconnect attempt itself fails, but it
        // must get past the state guard and land back in Idle.
        let mut session = TranscriptionSession::new(TranscribeConfig {
            nats_url: "nats://127.0.0.1:1".to_string(),
            ..Default::default()
        });
        let (events_tx, _events_rx) = mpsc::channel(8);
        session.events_tx = Some(events_tx);
        session.set_state(TranscribeState::Errored);

        let err = session.reconnect().await.unwrap_err();

        assert!(!err.to_string().contains("errored state"));
        assert_eq!(session.state(), TranscribeState::Idle);
    }
}
