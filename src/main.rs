use anyhow::Result;
use clap::{Parser, Subcommand};
use parley::{
    audio, CaptureConfig, CaptureEvent, CaptureSession, Config, GenerationRequest,
    TranscribeConfig, TranscribeEvent, TranscriptionSession,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "parley", about = "Live meeting audio capture and transcription")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available audio input devices
    Devices,
    /// Run a live capture and transcription session
    Capture {
        /// Configuration file (without extension)
        #[arg(long, default_value = "config/parley")]
        config: String,
    },
    /// Ask the configured reasoning model a question
    Ask {
        /// Configuration file (without extension)
        #[arg(long, default_value = "config/parley")]
        config: String,
        /// Question text
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Devices => {
            for name in audio::device::list_input_devices()? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Capture { config } => run_capture(&config).await,
        Command::Ask { config, question } => {
            let cfg = Config::load(&config)?;
            let responder = cfg.reasoning.build_responder();
            let request = GenerationRequest::new(question, cfg.reasoning.primary_model.clone());

            println!("{}", responder.respond(&request).await);
            Ok(())
        }
    }
}

async fn run_capture(config_path: &str) -> Result<()> {
    let cfg = Config::load(config_path)?;

    let (capture, mut events) = CaptureSession::new(CaptureConfig {
        microphone_device: cfg.capture.microphone_device.clone(),
        loopback_device: cfg.capture.loopback_device.clone(),
        ..Default::default()
    });

    let active = capture.start().await?;
    info!(
        "Capturing (microphone={}, system_audio={})",
        active.microphone, active.system_audio
    );

    let mut transcription = TranscriptionSession::new(TranscribeConfig {
        nats_url: cfg.transcribe.nats_url.clone(),
        language_code: cfg.transcribe.language_code.clone(),
        ..Default::default()
    });
    let mut transcripts = transcription.connect().await?;

    tokio::spawn(async move {
        while let Some(event) = transcripts.recv().await {
            match event {
                TranscribeEvent::Result(result) => {
                    if result.is_final {
                        println!("\n{}", result.text);
                    } else {
                        print!("\r{}", result.text);
                        std::io::Write::flush(&mut std::io::stdout()).ok();
                    }
                }
                TranscribeEvent::Error(e) => warn!("Recognition stream error: {}", e),
                TranscribeEvent::Closed => break,
            }
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(CaptureEvent::Chunk(chunk)) => {
                    transcription.write_chunk(&chunk).await?;
                }
                Some(CaptureEvent::SourceError { source, error }) => {
                    warn!("{} error: {}", source.label(), error);
                }
                Some(CaptureEvent::DeviceChanged { source, device }) => {
                    info!("{} device changed: {:?}", source.label(), device);
                }
                Some(CaptureEvent::Fatal(message)) => {
                    error!("{}", message);
                    break;
                }
                None => break,
            }
        }
    }

    capture.stop().await;
    transcription.close().await;

    Ok(())
}
