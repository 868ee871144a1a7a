use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{Level, info, warn};

use live_transcript::audio::{
    AudioSink, CaptureQueue, DiscardSink, PlaybackClock, WavCaptureSource, WavSink,
};
use live_transcript::core::realtime::{GeminiLiveClient, LiveTransport};
use live_transcript::core::session::{
    CONTROL_CHANNEL_CAPACITY, LiveSession, SessionEvent, spawn_stdin_reader,
};
use live_transcript::{LiveSettings, Role};

/// Live Transcript - Gemini Live voice client with interruption recovery
#[derive(Parser, Debug)]
#[command(name = "live-transcript")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Google Cloud project for the Vertex backend
    #[arg(long)]
    project_id: Option<String>,

    /// Vertex AI location
    #[arg(long)]
    location: Option<String>,

    #[arg(long)]
    model: Option<String>,

    /// Transcription model; pass an empty string for the server default
    #[arg(long)]
    transcription_model: Option<String>,

    #[arg(long)]
    voice_name: Option<String>,

    #[arg(long)]
    disable_proactive_audio: bool,

    #[arg(long)]
    disable_affective_dialog: bool,

    /// Fail instead of retrying setup with the default transcriber
    #[arg(long)]
    disable_transcription_model_fallback: bool,

    /// 16-bit mono WAV streamed as microphone input (silence if omitted)
    #[arg(long, value_name = "FILE")]
    input_wav: Option<PathBuf>,

    /// Record the played model audio to this WAV file
    #[arg(long, value_name = "FILE")]
    output_wav: Option<PathBuf>,

    /// Number of recent turns included in resume prompts
    #[arg(long, value_name = "N")]
    history_window: Option<usize>,
}

impl Cli {
    fn apply(&self, settings: &mut LiveSettings) {
        if let Some(project_id) = &self.project_id {
            settings.project_id = Some(project_id.clone());
        }
        if let Some(location) = &self.location {
            settings.location = location.clone();
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(model) = &self.transcription_model {
            settings.transcription_model = Some(model.clone()).filter(|m| !m.trim().is_empty());
        }
        if let Some(voice) = &self.voice_name {
            settings.voice_name = voice.clone();
        }
        if self.disable_proactive_audio {
            settings.enable_proactive_audio = false;
        }
        if self.disable_affective_dialog {
            settings.enable_affective_dialog = false;
        }
        if self.disable_transcription_model_fallback {
            settings.fallback_to_default_transcription = false;
        }
        if let Some(window) = self.history_window {
            settings.history_window = window;
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Transcript(segment) => {
            let role = match segment.role {
                Role::User => "USER",
                Role::Model => "MODEL",
            };
            let stage = if segment.is_final { "FINAL" } else { "PARTIAL" };
            println!("[{role}][{stage}] {}", segment.text);
        }
        SessionEvent::Interrupted { heard_text, .. } => {
            println!("[MODEL][INTERRUPTED] {heard_text}");
        }
        SessionEvent::ResumeInjected { prompt } => {
            println!("[RESUME CONTEXT]");
            for line in prompt.lines() {
                println!("  | {line}");
            }
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("transcript printer lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load configuration from file or environment, then apply CLI flags
    let mut settings =
        LiveSettings::load(cli.config.as_ref()).map_err(|e| anyhow!(e.to_string()))?;
    cli.apply(&mut settings);
    settings.validate().map_err(|e| anyhow!(e.to_string()))?;

    let level = if settings.debug_events {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }
    info!(
        backend = %settings.backend,
        model = %settings.model,
        transcription_model = settings.transcription_model.as_deref().unwrap_or("default"),
        "Connecting to Gemini Live"
    );

    let client = GeminiLiveClient::connect(settings.gemini_config()).await?;
    let transport: Arc<dyn LiveTransport> = Arc::new(client);

    let session = LiveSession::builder(transport)
        .config(settings.engine_config())
        .build();
    let cancel = session.cancellation_token();

    // Capture side
    let capture = Arc::new(CaptureQueue::default());
    let source = match &cli.input_wav {
        Some(path) => WavCaptureSource::open(path, settings.input_sample_rate_hz)?,
        None => WavCaptureSource::from_pcm(Vec::new(), settings.input_sample_rate_hz),
    };
    let capture_task = tokio::spawn(source.run(capture.clone(), cancel.clone()));

    // Playback side
    let sink: Box<dyn AudioSink> = match &cli.output_wav {
        Some(path) => Box::new(WavSink::create(path, settings.output_sample_rate_hz)?),
        None => Box::new(DiscardSink),
    };
    let clock = PlaybackClock::new(settings.output_sample_rate_hz);
    let playback_task = tokio::spawn(clock.run(session.playback(), sink, cancel.clone()));

    // Control input
    let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
    // Never joined; the thread stays blocked on the terminal until a line arrives.
    spawn_stdin_reader(control_tx)?;

    let printer = tokio::spawn(print_events(session.subscribe()));

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                cancel.cancel();
            }
        });
    }

    println!("Speak, or type /text <message>, /interrupt, /quit");
    let result = session.run(capture, control_rx).await;

    let _ = capture_task.await;
    match playback_task.await {
        Ok(Err(e)) => warn!("playback output failed: {}", e),
        Err(e) => warn!("playback task failed: {}", e),
        Ok(Ok(())) => {}
    }
    drop(session);
    let _ = printer.await;

    let summary = result?;
    println!("total_interruptions={}", summary.interruption_count);
    Ok(())
}
