use anyhow::{bail, Result};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{CaptureError, CaptureEvent};
use crate::audio::{SourceKind, SourcePipeline};

/// Configuration for a capture session
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Microphone device name (None = host default input)
    pub microphone_device: Option<String>,
    /// Loopback/system-audio virtual device name
    pub loopback_device: Option<String>,
    /// Quiescence window coalescing bursts of device-change notifications
    pub quiescence: Duration,
    /// Event channel capacity
    pub event_buffer: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            microphone_device: None,
            loopback_device: None,
            quiescence: Duration::from_secs(1),
            event_buffer: 256,
        }
    }
}

/// Capture session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Running,
    Paused,
    /// Internal sub-state during a debounced device-change restart
    Recovering,
    Stopped,
}

/// Which sources came up on `start()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveSources {
    pub microphone: bool,
    pub system_audio: bool,
}

impl ActiveSources {
    pub fn any(&self) -> bool {
        self.microphone || self.system_audio
    }
}

struct Pipelines {
    microphone: Option<SourcePipeline>,
    system: Option<SourcePipeline>,
}

struct Inner {
    config: CaptureConfig,
    /// Guards state transitions only; held around check-and-flag
    /// mutation, never around device I/O.
    state: StdMutex<CaptureState>,
    /// Guards exclusive access to the pipeline objects during I/O.
    pipelines: Mutex<Pipelines>,
    events_tx: mpsc::Sender<CaptureEvent>,
}

struct DeviceChange {
    source: SourceKind,
    device: Option<String>,
}

/// Orchestrates both source pipelines.
///
/// `start()` brings the pipelines up independently: one source failing
/// degrades the session, both failing fails `start()`. All lifecycle
/// operations are idempotent under the current state.
pub struct CaptureSession {
    inner: Arc<Inner>,
    notify_tx: mpsc::Sender<DeviceChange>,
    watcher: JoinHandle<()>,
}

impl CaptureSession {
    /// Create a session and the event channel its consumer reads from.
    pub fn new(config: CaptureConfig) -> (Self, mpsc::Receiver<CaptureEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);
        let (notify_tx, notify_rx) = mpsc::channel(16);

        let inner = Arc::new(Inner {
            config,
            state: StdMutex::new(CaptureState::Idle),
            pipelines: Mutex::new(Pipelines {
                microphone: None,
                system: None,
            }),
            events_tx,
        });

        let watcher = tokio::spawn(run_watcher(Arc::clone(&inner), notify_rx));

        (
            Self {
                inner,
                notify_tx,
                watcher,
            },
            events_rx,
        )
    }

    pub fn state(&self) -> CaptureState {
        *self.inner.state.lock().unwrap()
    }

    /// Bring up both source pipelines. Fails only when neither source
    /// could be started; a single-source failure is reported as a
    /// `SourceError` event and the session runs degraded.
    pub async fn start(&self) -> Result<ActiveSources> {
        let already_started = {
            let st = self.inner.state.lock().unwrap();
            matches!(
                *st,
                CaptureState::Running | CaptureState::Paused | CaptureState::Recovering
            )
        };
        if already_started {
            warn!("Capture session already started");
            return Ok(self.inner.active_sources().await);
        }

        let active = self.inner.start_pipelines().await?;

        *self.inner.state.lock().unwrap() = CaptureState::Running;

        info!(
            "Capture session running (microphone={}, system_audio={})",
            active.microphone, active.system_audio
        );

        Ok(active)
    }

    /// Tear down both pipelines and release device handles. Safe and
    /// idempotent from any state.
    pub async fn stop(&self) {
        {
            let mut st = self.inner.state.lock().unwrap();
            if *st == CaptureState::Stopped {
                return;
            }
            *st = CaptureState::Stopped;
        }

        self.inner.stop_pipelines().await;
        info!("Capture session stopped");
    }

    /// Suspend frame delivery without releasing device handles. The
    /// system-audio source has no true pause and is fully stopped.
    pub async fn pause(&self) -> Result<()> {
        {
            let mut st = self.inner.state.lock().unwrap();
            if *st != CaptureState::Running {
                return Ok(());
            }
            *st = CaptureState::Paused;
        }

        let mut pipes = self.inner.pipelines.lock().await;

        // Loopback capture cannot be suspended in place; tear it down
        // before touching the microphone so a pause failure cannot
        // leave it delivering under a paused session.
        if let Some(system) = pipes.system.as_mut() {
            system.stop().await;
        }
        pipes.system = None;

        if let Some(mic) = pipes.microphone.as_mut() {
            mic.pause()?;
        }

        info!("Capture session paused");
        Ok(())
    }

    /// Resume a paused session. The system-audio pipeline is restarted
    /// from scratch; a restart failure degrades rather than fails.
    pub async fn resume(&self) -> Result<()> {
        {
            let mut st = self.inner.state.lock().unwrap();
            if *st != CaptureState::Paused {
                return Ok(());
            }
            *st = CaptureState::Running;
        }

        let mut pipes = self.inner.pipelines.lock().await;
        if let Some(mic) = pipes.microphone.as_mut() {
            mic.resume()?;
        }

        let mut system = SourcePipeline::new(
            SourceKind::SystemAudio,
            self.inner.config.loopback_device.clone(),
        );
        match system.start(self.inner.events_tx.clone()) {
            Ok(()) => pipes.system = Some(system),
            Err(e) => {
                warn!("System audio restart on resume failed: {:#}", e);
                let _ = self
                    .inner
                    .events_tx
                    .send(CaptureEvent::SourceError {
                        source: SourceKind::SystemAudio,
                        error: CaptureError::Device(format!("{e:#}")),
                    })
                    .await;
            }
        }

        info!("Capture session resumed");
        Ok(())
    }

    /// Report that the active audio configuration changed. Bursts of
    /// notifications are coalesced; after a quiescence window the
    /// session performs one full stop/start restart.
    pub fn notify_device_change(&self, source: SourceKind, device: Option<String>) {
        if self
            .notify_tx
            .try_send(DeviceChange { source, device })
            .is_err()
        {
            warn!("Device-change notification dropped (watcher backlog)");
        }
    }

    /// Which sources are currently capturing (or paused).
    pub async fn active_sources(&self) -> ActiveSources {
        self.inner.active_sources().await
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

impl Inner {
    async fn start_pipelines(&self) -> Result<ActiveSources> {
        let mut pipes = self.pipelines.lock().await;
        let mut active = ActiveSources::default();

        let mut mic = SourcePipeline::new(
            SourceKind::Microphone,
            self.config.microphone_device.clone(),
        );
        match mic.start(self.events_tx.clone()) {
            Ok(()) => {
                active.microphone = true;
                pipes.microphone = Some(mic);
            }
            Err(e) => {
                warn!("Microphone start failed: {:#}", e);
                let _ = self
                    .events_tx
                    .send(CaptureEvent::SourceError {
                        source: SourceKind::Microphone,
                        error: CaptureError::Device(format!("{e:#}")),
                    })
                    .await;
            }
        }

        let mut system =
            SourcePipeline::new(SourceKind::SystemAudio, self.config.loopback_device.clone());
        match system.start(self.events_tx.clone()) {
            Ok(()) => {
                active.system_audio = true;
                pipes.system = Some(system);
            }
            Err(e) => {
                warn!("System audio start failed: {:#}", e);
                let _ = self
                    .events_tx
                    .send(CaptureEvent::SourceError {
                        source: SourceKind::SystemAudio,
                        error: CaptureError::Device(format!("{e:#}")),
                    })
                    .await;
            }
        }

        if !active.any() {
            bail!("No capture source could be started");
        }

        Ok(active)
    }

    async fn stop_pipelines(&self) {
        let mut pipes = self.pipelines.lock().await;
        if let Some(mut mic) = pipes.microphone.take() {
            mic.stop().await;
        }
        if let Some(mut system) = pipes.system.take() {
            system.stop().await;
        }
    }

    async fn active_sources(&self) -> ActiveSources {
        let pipes = self.pipelines.lock().await;
        ActiveSources {
            microphone: pipes.microphone.is_some(),
            system_audio: pipes.system.is_some(),
        }
    }

    /// One full stop/start restart after a device-change burst. A
    /// failed restart is fatal: the session stops rather than retrying
    /// indefinitely.
    async fn recover(&self) {
        {
            let mut st = self.state.lock().unwrap();
            if !matches!(*st, CaptureState::Running | CaptureState::Paused) {
                return;
            }
            *st = CaptureState::Recovering;
        }

        info!("Audio configuration changed, restarting capture");
        self.stop_pipelines().await;

        match self.start_pipelines().await {
            Ok(active) => {
                let resumed = {
                    let mut st = self.state.lock().unwrap();
                    if *st == CaptureState::Recovering {
                        *st = CaptureState::Running;
                        true
                    } else {
                        false
                    }
                };
                if resumed {
                    info!(
                        "Capture recovered (microphone={}, system_audio={})",
                        active.microphone, active.system_audio
                    );
                } else {
                    // stop() raced the restart; honor it.
                    self.stop_pipelines().await;
                }
            }
            Err(e) => {
                *self.state.lock().unwrap() = CaptureState::Stopped;
                error!("Capture restart failed: {:#}", e);
                let _ = self
                    .events_tx
                    .send(CaptureEvent::Fatal(format!("Capture restart failed: {e:#}")))
                    .await;
            }
        }
    }
}


/// Debounce task: forwards device-change events to the consumer and
/// coalesces each burst into a single restart.
async fn run_watcher(inner: Arc<Inner>, mut notify_rx: mpsc::Receiver<DeviceChange>) {
    while let Some(change) = notify_rx.recv().await {
        let _ = inner
            .events_tx
            .send(CaptureEvent::DeviceChanged {
                source: change.source,
                device: change.device,
            })
            .await;

        // Quiescence window restarts on each further notification.
        loop {
            tokio::select! {
                _ = tokio::time::sleep(inner.config.quiescence) => break,
                more = notify_rx.recv() => match more {
                    Some(change) => {
                        let _ = inner
                            .events_tx
                            .send(CaptureEvent::DeviceChanged {
                                source: change.source,
                                device: change.device,
                            })
                            .await;
                    }
                    None => break,
                },
            }
        }

        inner.recover().await;
    }
}
