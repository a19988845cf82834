// Source pipeline: owns one capture device, its format converter, and
// its silence monitor, and emits canonical-format chunks.
//
// The device callback runs on cpal's capture thread and does nothing
// but sample-format widening and a non-blocking channel handoff; a
// blocked capture callback risks OS-level audio dropouts. Conversion,
// silence checking, and downstream dispatch run on a worker task.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::chunk::{AudioChunk, SourceKind, CHUNK_WINDOW_MS, CHUNK_WINDOW_SAMPLES};
use super::converter::FormatConverter;
use super::device;
use super::silence::SilenceMonitor;
use crate::capture::{CaptureError, CaptureEvent};

/// Raw interleaved block handed off by the device callback.
struct RawBlock {
    samples: Vec<i16>,
    timestamp_ms: u64,
}

/// cpal streams are not Send. The pipeline owns its stream exclusively
/// and only touches it from lifecycle methods, one call at a time.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Configured,
    Started,
    Capturing,
    Stopped,
}

/// One capture source: device handle, converter, silence monitor.
///
/// Each pipeline exclusively owns its device handle and converter; no
/// cross-pipeline sharing.
pub struct SourcePipeline {
    source: SourceKind,
    device_name: Option<String>,
    state: PipelineState,
    stream: Option<SendableStream>,
    worker: Option<JoinHandle<()>>,
}

impl SourcePipeline {
    pub fn new(source: SourceKind, device_name: Option<String>) -> Self {
        Self {
            source,
            device_name,
            state: PipelineState::Configured,
            stream: None,
            worker: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == PipelineState::Capturing
    }

    /// Bring up the device and start emitting chunks on `events`.
    pub fn start(&mut self, events: mpsc::Sender<CaptureEvent>) -> Result<()> {
        if matches!(self.state, PipelineState::Started | PipelineState::Capturing) {
            warn!("{} pipeline already started", self.source.label());
            return Ok(());
        }

        let device = device::input_device(self.device_name.as_deref())
            .with_context(|| format!("Failed to open {} device", self.source.label()))?;

        let default_config = device
            .default_input_config()
            .with_context(|| format!("Failed to query {} input config", self.source.label()))?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels();

        let converter = FormatConverter::new(native_rate, native_channels)
            .map_err(|e| anyhow!("Unsupported {} format: {}", self.source.label(), e))?;

        info!(
            "Starting {} pipeline: {}Hz, {} channels, {:?}",
            self.source.label(),
            native_rate,
            native_channels,
            default_config.sample_format()
        );

        let (raw_tx, raw_rx) = mpsc::channel::<RawBlock>(64);
        let started = Instant::now();
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        let source = self.source;
        let error_events = events.clone();
        let err_callback = move |err: cpal::StreamError| {
            // Runs on the capture thread: report without blocking.
            let _ = error_events.try_send(CaptureEvent::SourceError {
                source,
                error: CaptureError::Stream(err.to_string()),
            });
        };

        let stream = match default_config.sample_format() {
            SampleFormat::I16 => {
                let tx = raw_tx.clone();
                device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            let block = RawBlock {
                                samples: data.to_vec(),
                                timestamp_ms: started.elapsed().as_millis() as u64,
                            };
                            // Never block the capture callback; a full
                            // channel means downstream is behind and the
                            // block is dropped.
                            let _ = tx.try_send(block);
                        },
                        err_callback,
                        None,
                    )
                    .with_context(|| format!("Failed to build {} stream", self.source.label()))?
            }
            SampleFormat::F32 => {
                let tx = raw_tx.clone();
                device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            let samples: Vec<i16> = data
                                .iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                                .collect();
                            let block = RawBlock {
                                samples,
                                timestamp_ms: started.elapsed().as_millis() as u64,
                            };
                            let _ = tx.try_send(block);
                        },
                        err_callback,
                        None,
                    )
                    .with_context(|| format!("Failed to build {} stream", self.source.label()))?
            }
            fmt => bail!(
                "Unsupported sample format {:?} on {} device",
                fmt,
                self.source.label()
            ),
        };
        drop(raw_tx);

        self.state = PipelineState::Started;

        if let Err(e) = stream.play() {
            self.state = PipelineState::Configured;
            return Err(e)
                .with_context(|| format!("Failed to start {} stream", self.source.label()));
        }

        self.stream = Some(SendableStream(stream));
        self.worker = Some(spawn_worker(self.source, converter, raw_rx, events));
        self.state = PipelineState::Capturing;

        info!("{} pipeline capturing", self.source.label());

        Ok(())
    }

    /// Suspend frame delivery without releasing the device handle.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != PipelineState::Capturing {
            return Ok(());
        }

        if let Some(stream) = &self.stream {
            stream
                .0
                .pause()
                .with_context(|| format!("Failed to pause {} stream", self.source.label()))?;
        }

        self.state = PipelineState::Started;
        debug!("{} pipeline paused", self.source.label());

        Ok(())
    }

    /// Resume frame delivery on a paused pipeline.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != PipelineState::Started {
            return Ok(());
        }

        if let Some(stream) = &self.stream {
            stream
                .0
                .play()
                .with_context(|| format!("Failed to resume {} stream", self.source.label()))?;
        }

        self.state = PipelineState::Capturing;
        debug!("{} pipeline resumed", self.source.label());

        Ok(())
    }

    /// Tear down the device and drain the worker. Safe from any state.
    pub async fn stop(&mut self) {
        // Dropping the stream drops the callback's sender, which ends
        // the worker once it has drained buffered blocks.
        self.stream = None;

        if let Some(worker) = self.worker.take() {
            drain_worker(self.source, worker).await;
        }

        if self.state != PipelineState::Stopped {
            info!("{} pipeline stopped", self.source.label());
        }
        self.state = PipelineState::Stopped;
    }
}

/// How long `stop()` waits for the worker to drain buffered blocks. A
/// consumer that stopped reading events would otherwise park the worker
/// on a full channel and hang the teardown.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

async fn drain_worker(source: SourceKind, worker: JoinHandle<()>) {
    let abort = worker.abort_handle();
    match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("{} pipeline worker panicked: {}", source.label(), e),
        Err(_) => {
            abort.abort();
            warn!(
                "{} pipeline worker did not drain in time, aborted",
                source.label()
            );
        }
    }
}

/// One completed canonical-format window awaiting dispatch.
struct Window {
    samples: Vec<i16>,
    timestamp_ms: u64,
}

/// Accumulates converted samples into fixed-duration windows.
///
/// Window timestamps are synthetic: the first block of a window anchors
/// it, and each subsequent window advances by the window duration. The
/// anchor never regresses below the previous window's end, so per-source
/// timestamps stay monotonic even when device timestamps jitter
/// backwards.
struct ChunkAssembler {
    acc: Vec<i16>,
    window_start: Option<u64>,
}

impl ChunkAssembler {
    fn new() -> Self {
        Self {
            acc: Vec::with_capacity(CHUNK_WINDOW_SAMPLES * 2),
            window_start: None,
        }
    }

    /// Append one converted block; returns the windows it completed, in
    /// capture order. Leftover samples carry into the next window.
    fn push(&mut self, samples: &[i16], timestamp_ms: u64) -> Vec<Window> {
        if samples.is_empty() {
            return Vec::new();
        }

        if self.acc.is_empty() {
            self.window_start = Some(
                self.window_start
                    .map_or(timestamp_ms, |prev| prev.max(timestamp_ms)),
            );
        }
        self.acc.extend_from_slice(samples);

        let mut windows = Vec::new();
        while self.acc.len() >= CHUNK_WINDOW_SAMPLES {
            let rest = self.acc.split_off(CHUNK_WINDOW_SAMPLES);
            let window = std::mem::replace(&mut self.acc, rest);
            let ts = self.window_start.unwrap_or(0);

            windows.push(Window {
                samples: window,
                timestamp_ms: ts,
            });
            self.window_start = Some(ts + CHUNK_WINDOW_MS);
        }

        windows
    }
}

/// Background worker: converts raw blocks, runs the silence check, and
/// dispatches fixed-duration chunks in capture order.
fn spawn_worker(
    source: SourceKind,
    converter: FormatConverter,
    mut raw_rx: mpsc::Receiver<RawBlock>,
    events: mpsc::Sender<CaptureEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let monitor = SilenceMonitor::default();
        let mut assembler = ChunkAssembler::new();

        while let Some(block) = raw_rx.recv().await {
            let converted = match converter.convert(&block.samples) {
                Ok(samples) => samples,
                Err(e) => {
                    // Recoverable, scoped to this source; the block is
                    // dropped and capture continues.
                    warn!("{} conversion error: {}", source.label(), e);
                    let _ = events
                        .send(CaptureEvent::SourceError {
                            source,
                            error: CaptureError::Conversion(e.to_string()),
                        })
                        .await;
                    continue;
                }
            };

            // Near-miss conversions yield empty output; treat as a
            // transient empty chunk, not an error.
            for window in assembler.push(&converted, block.timestamp_ms) {
                monitor.observe(source, &window.samples);

                let chunk = AudioChunk::from_samples(source, &window.samples, window.timestamp_ms);
                if events.send(CaptureEvent::Chunk(chunk)).await.is_err() {
                    debug!("{} event channel closed, worker exiting", source.label());
                    return;
                }
            }
        }

        debug!("{} pipeline worker drained", source.label());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_multiple_block_emits_full_windows() {
        let mut assembler = ChunkAssembler::new();

        let windows = assembler.push(&vec![1i16; CHUNK_WINDOW_SAMPLES * 2], 0);

        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.samples.len() == CHUNK_WINDOW_SAMPLES));
        assert_eq!(windows[0].timestamp_ms, 0);
        assert_eq!(windows[1].timestamp_ms, CHUNK_WINDOW_MS);
        assert!(assembler.acc.is_empty());
    }

    #[test]
    fn test_leftover_samples_carry_in_capture_order() {
        let mut assembler = ChunkAssembler::new();

        assert!(assembler.push(&vec![7i16; 1000], 0).is_empty());

        let windows = assembler.push(&vec![9i16; 1000], 62);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].timestamp_ms, 0);
        // First block's samples precede the second's within the window.
        assert!(windows[0].samples[..1000].iter().all(|&s| s == 7));
        assert!(windows[0].samples[1000..].iter().all(|&s| s == 9));

        // The 400 leftover samples open the next window.
        let windows = assembler.push(&vec![3i16; CHUNK_WINDOW_SAMPLES - 400], 125);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].timestamp_ms, CHUNK_WINDOW_MS);
        assert!(windows[0].samples[..400].iter().all(|&s| s == 9));
    }

    #[test]
    fn test_window_timestamps_never_regress() {
        let mut assembler = ChunkAssembler::new();

        let windows = assembler.push(&vec![0i16; CHUNK_WINDOW_SAMPLES], 500);
        assert_eq!(windows[0].timestamp_ms, 500);

        // Device timestamp jitters backwards; the synthetic anchor
        // holds at the previous window's end.
        let windows = assembler.push(&vec![0i16; CHUNK_WINDOW_SAMPLES], 200);
        assert_eq!(windows[0].timestamp_ms, 500 + CHUNK_WINDOW_MS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_worker_is_aborted_on_stop() {
        // A worker that never finishes must not hang the teardown.
        let worker = tokio::spawn(std::future::pending::<()>());

        drain_worker(SourceKind::Microphone, worker).await;
    }
}
