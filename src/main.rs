//! p3kit - Command-line entry point
//!
//! Thin CLI over the library: batch conversion to and from the P3
//! container, stream inspection, and playlist playback.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use p3kit::config::Config;
use p3kit::events::{PlayerEvent, SessionOutcome};
use p3kit::pipeline::{self, EncodeOptions};
use p3kit::playback::{EngineConfig, PlaybackEngine, Playlist};

/// Command-line arguments for p3kit
#[derive(Parser, Debug)]
#[command(name = "p3kit")]
#[command(about = "Convert and play P3 streaming audio files")]
#[command(version)]
struct Cli {
    /// Config file path (defaults to the platform config directory)
    #[arg(long, global = true, env = "P3KIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert audio files (wav/mp3/flac/ogg/...) to P3
    Encode {
        /// Input audio files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        out_dir: PathBuf,

        /// Loudness target in LUFS
        #[arg(long)]
        target_lufs: Option<f64>,

        /// Disable loudness normalization
        #[arg(long)]
        no_loudnorm: bool,

        /// Opus bitrate in bits/s
        #[arg(long)]
        bitrate: Option<i32>,
    },

    /// Convert P3 files back to 16-bit mono WAV
    Decode {
        /// Input .p3 files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        out_dir: PathBuf,
    },

    /// Print frame statistics for a P3 file
    Info {
        /// Input .p3 file
        file: PathBuf,
    },

    /// Play P3 files in order
    Play {
        /// Input .p3 files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Loop through the playlist until interrupted
        #[arg(long = "loop")]
        looping: bool,

        /// Output device name
        #[arg(long, env = "P3KIT_DEVICE")]
        device: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "p3kit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Encode {
            inputs,
            out_dir,
            target_lufs,
            no_loudnorm,
            bitrate,
        } => {
            let opts = EncodeOptions {
                target_lufs: if no_loudnorm {
                    None
                } else {
                    target_lufs.or(config.target_lufs).or(Some(-16.0))
                },
                bitrate: bitrate.or(config.opus_bitrate),
            };
            run_batch(&inputs, &out_dir, "p3", |input, output| {
                pipeline::encode_file(input, output, &opts).map(|_| ())
            })
        }
        Command::Decode { inputs, out_dir } => run_batch(&inputs, &out_dir, "wav", |input, output| {
            pipeline::extract_file(input, output).map(|_| ())
        }),
        Command::Info { file } => {
            let info = pipeline::inspect_file(&file)
                .with_context(|| format!("Failed to inspect {}", file.display()))?;
            println!("{}", file.display());
            println!("  frames:        {}", info.frames);
            println!("  payload bytes: {}", info.payload_bytes);
            println!("  duration:      {:.1}s", info.duration_secs);
            Ok(())
        }
        Command::Play {
            files,
            looping,
            device,
        } => play(files, looping, device.or(config.output_device)),
    }
}

/// Convert each input, skipping (and reporting) failures.
fn run_batch(
    inputs: &[PathBuf],
    out_dir: &Path,
    extension: &str,
    convert: impl Fn(&Path, &Path) -> p3kit::Result<()>,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut converted = 0usize;
    let mut failed = 0usize;

    for input in inputs {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let output = out_dir.join(format!("{}.{}", stem, extension));

        match convert(input, &output) {
            Ok(()) => {
                info!("Converted: {}", input.display());
                converted += 1;
            }
            Err(e) => {
                // One bad file never aborts the batch.
                error!("Failed to convert {}: {}", input.display(), e);
                failed += 1;
            }
        }
    }

    info!("Done: {} converted, {} failed", converted, failed);
    if converted == 0 && failed > 0 {
        anyhow::bail!("All {} input file(s) failed to convert", failed);
    }
    Ok(())
}

/// Play the given files through one engine, advancing on track end.
fn play(files: Vec<PathBuf>, looping: bool, device: Option<String>) -> Result<()> {
    let engine = Arc::new(PlaybackEngine::new(EngineConfig {
        output_device: device,
        ..EngineConfig::default()
    }));

    let (tx, rx) = mpsc::channel();
    engine.set_event_sender(tx);

    let mut playlist = Playlist::new(Arc::clone(&engine));
    for file in &files {
        playlist.add(file);
    }
    playlist.set_looping(looping);

    playlist
        .select_and_play(0)
        .context("Failed to start playback")?;

    while let Ok(event) = rx.recv() {
        match event {
            PlayerEvent::TrackFinished { outcome, label, .. } => {
                match outcome {
                    SessionOutcome::Stopped => break,
                    SessionOutcome::Failed(reason) => {
                        // Report and move on; siblings still play.
                        error!("Playback of {} failed: {}", label, reason);
                    }
                    SessionOutcome::Exhausted => {}
                }
                if !playlist.advance().context("Failed to advance playlist")? {
                    break;
                }
            }
            PlayerEvent::TrackStarted { label, .. } => {
                info!("Now playing: {}", label);
            }
            PlayerEvent::StateChanged { .. } => {}
        }
    }

    Ok(())
}
