use anyhow::{Context, Result};
use clap::Parser;
use iat_stream::{AudioFile, AutoTranscoder, Config, RecognitionSession, SessionConfig};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "iat-stream")]
#[command(about = "Transcribe an audio file with the streaming dictation service")]
struct Args {
    /// Audio file (.pcm/.raw 16kHz mono s16le, .wav, or anything ffmpeg reads)
    file: PathBuf,

    /// Config file (extension optional); IAT__* environment variables override it
    #[arg(short, long, default_value = "config/iat-stream")]
    config: String,

    /// Print the transcript to stderr as it is revised
    #[arg(short, long)]
    partial: bool,

    /// Override the end-of-speech silence threshold (ms)
    #[arg(long)]
    vad_eos: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let cfg = Config::load(&args.config)?;
    info!("{} starting", cfg.service.name);

    let mut session_config = SessionConfig::from(&cfg);
    if let Some(vad_eos) = args.vad_eos {
        session_config.business.vad_eos_ms = vad_eos;
    }

    let audio = AudioFile::open(&args.file)?;
    let pcm = audio
        .to_pcm(&AutoTranscoder::default())
        .await
        .with_context(|| format!("Failed to prepare {}", audio.path))?;

    let session = RecognitionSession::new(session_config);
    let cancel = session.cancel_handle();

    if args.partial {
        let mut partial = session.subscribe_partial();
        tokio::spawn(async move {
            while partial.changed().await.is_ok() {
                let text = partial.borrow_and_update().clone();
                eprint!("\r{}", text);
                std::io::stderr().flush().ok();
            }
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling recognition");
            cancel.cancel();
        }
    });

    let recognition = session
        .recognize_detailed(pcm)
        .await
        .context("Recognition failed")?;

    if args.partial {
        eprintln!();
    }
    info!(
        "Session {} (sid={}) took {:.1}s",
        recognition.stats.session_id,
        recognition.stats.sid.as_deref().unwrap_or("-"),
        recognition.stats.duration_secs
    );
    println!("{}", recognition.text);

    Ok(())
}
