use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use live_captions::audio::MicrophoneBackend;
use live_captions::{
    meter_line, CaptureBackendFactory, CaptureSession, CaptureSource, Config, ConsoleSink,
    FlushPolicyKind, HttpTranscriber, SessionConfig, SyntheticScript, TranscriptRenderer,
};

#[derive(Parser, Debug)]
#[command(
    name = "live-captions",
    about = "Live microphone captioning against a remote transcription endpoint"
)]
struct Cli {
    /// Config file (TOML/YAML/JSON); built-in defaults when omitted
    #[arg(long)]
    config: Option<String>,

    /// Transcription endpoint override
    #[arg(long)]
    endpoint: Option<String>,

    /// Flush policy override
    #[arg(long, value_enum)]
    policy: Option<FlushPolicyKind>,

    /// Use the scripted synthetic source instead of the microphone
    #[arg(long)]
    synthetic: bool,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Stop automatically after this many seconds
    #[arg(long)]
    max_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if cli.list_devices {
        for name in MicrophoneBackend::list_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(endpoint) = cli.endpoint {
        config.transcription.endpoint = endpoint;
    }

    let policy = config.flush.policy(cli.policy);

    info!("live-captions v0.1.0");
    info!("Flush policy: {:?}", policy.kind());

    let source = if cli.synthetic {
        CaptureSource::Synthetic(SyntheticScript::speech_with_pauses())
    } else {
        CaptureSource::Microphone
    };
    let backend = CaptureBackendFactory::create(source, config.audio.capture())?;

    let transcriber = Arc::new(HttpTranscriber::new(
        config.transcription.endpoint.clone(),
        config.transcription.connect_timeout(),
        config.transcription.request_timeout(),
    )?);
    info!("Transcription endpoint: {}", transcriber.endpoint());

    let renderer = TranscriptRenderer::new(config.display.renderer(), Box::new(ConsoleSink::new()));

    let waveform = config.display.waveform();
    let meter_height = waveform.height;
    let session_config = SessionConfig {
        policy,
        waveform,
        ..SessionConfig::default()
    };
    let session = Arc::new(CaptureSession::new(
        session_config,
        backend,
        transcriber,
        renderer,
    ));

    session.start().await?;
    info!(
        "Session {} recording; press Ctrl-C to stop",
        session.session_id()
    );

    // Live meter and elapsed clock on stderr; the transcript line owns
    // stdout
    let meter_session = Arc::clone(&session);
    let meter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        loop {
            ticker.tick().await;
            let bars = meter_session.waveform_snapshot().await;
            let stats = meter_session.stats().await;
            eprint!(
                "\r[{}] {}",
                stats.elapsed_label,
                meter_line(&bars, meter_height, 40)
            );
            let _ = std::io::stderr().flush();
        }
    });

    match cli.max_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }

    meter.abort();
    eprintln!();

    let stats = session.stop().await?;
    println!();
    info!(
        "Session {}: {} recorded, {} sends, {} words revealed",
        stats.session_id, stats.elapsed_label, stats.flushes_sent, stats.words_displayed
    );

    let transcript = session.transcript().await;
    if !transcript.is_empty() {
        println!("{transcript}");
    }

    Ok(())
}
