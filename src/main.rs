//! Ostinato CLI - watch, play and inspect pattern compositions headlessly.

use clap::{Parser, Subcommand};
use ostinato::config::SessionConfig;
use ostinato::demo::{SimEngine, SimGraph};
use ostinato::graph::TapKind;
use ostinato::metadata;
use ostinato::recorder::MonitorRecorder;
use ostinato::session::{PlaybackSession, PlaybackState, SessionEvent};
use ostinato::source::CompositionSource;
use ostinato::tap::GraphTap;
use ostinato::watcher::{FileProvider, SourceWatcher, WatcherEvent};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

const SAMPLE_RATE: u32 = 44100;

#[derive(Parser)]
#[command(name = "ostinato")]
#[command(about = "Hot-reload playback controller for pattern live coding", long_about = None)]
struct Cli {
    /// Config file (default: ostinato.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a composition file and hot-reload playback on change
    Watch {
        /// Composition file (falls back to the config's `composition`)
        file: Option<PathBuf>,

        /// Poll interval in milliseconds (overrides config)
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Analyser FFT size (overrides config)
        #[arg(long)]
        fft: Option<usize>,

        /// Record the monitor feed to a WAV file
        #[arg(short, long)]
        record: Option<PathBuf>,
    },

    /// Evaluate a composition once and play it for a while
    Play {
        file: PathBuf,

        /// How long to keep playing, in seconds
        #[arg(short, long, default_value = "4.0")]
        duration: f32,
    },

    /// Print tempo/key metadata scraped from a composition
    Meta { file: PathBuf },

    /// Evaluate a composition without playing it; exit code reports the result
    Check { file: PathBuf },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Commands::Watch {
            file,
            interval_ms,
            fft,
            record,
        } => cmd_watch(&config, file, interval_ms, fft, record),
        Commands::Play { file, duration } => cmd_play(&config, &file, duration),
        Commands::Meta { file } => cmd_meta(&file),
        Commands::Check { file } => cmd_check(&file),
    };

    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig, String> {
    match path {
        Some(path) => SessionConfig::from_file(path).map_err(|e| e.to_string()),
        None => SessionConfig::load().map_err(|e| e.to_string()),
    }
}

/// Live session: poll the file, reload playback on change, run the meter.
fn cmd_watch(
    config: &SessionConfig,
    file: Option<PathBuf>,
    interval_ms: Option<u64>,
    fft: Option<usize>,
    record: Option<PathBuf>,
) -> Result<(), String> {
    let file = file
        .or_else(|| config.composition.clone())
        .ok_or("no composition file given (argument or config)")?;
    let interval = Duration::from_millis(interval_ms.unwrap_or(config.poll_interval_ms));
    let fft_size = fft.unwrap_or(config.fft_size);

    let graph = Arc::new(Mutex::new(SimGraph::new(SAMPLE_RATE as f32)));
    let engine = Arc::new(SimEngine::new(Arc::clone(&graph)));
    let session = PlaybackSession::new(engine);

    let mut tap = GraphTap::new(Arc::clone(&graph), fft_size);
    if let Err(e) = tap.install() {
        warn!("visualizer tap unavailable: {e}");
    }

    let mut recorder = match &record {
        Some(path) => Some(
            MonitorRecorder::create(path, SAMPLE_RATE).map_err(|e| e.to_string())?,
        ),
        None => None,
    };

    // Status lines from the session, printed as they happen.
    let session_events = session.subscribe();
    thread::spawn(move || {
        for event in session_events {
            match event {
                SessionEvent::StateChanged(PlaybackState::Playing) => {
                    println!("✅ Playing");
                }
                SessionEvent::StateChanged(PlaybackState::Evaluating) => {
                    println!("🔄 Evaluating...");
                }
                SessionEvent::StateChanged(state) => println!("   {state:?}"),
                SessionEvent::Error(e) => {
                    println!("❌ {e}");
                    println!("   Fix the composition and save again to retry");
                }
            }
        }
    });

    let (mut watcher, events) = SourceWatcher::spawn(FileProvider::new(&file), interval);

    println!("🎵 Live session started!");
    println!("📝 Watching: {} (every {:?})", file.display(), interval);
    if let Some(path) = &record {
        println!("⏺  Recording monitor feed to {}", path.display());
    }
    println!("\nPress Ctrl+C to stop\n");

    loop {
        match events.recv_timeout(Duration::from_millis(250)) {
            Ok(WatcherEvent::Changed(source)) => {
                let bpm = metadata::extract_bpm(source.text()).unwrap_or(120.0);
                let key = metadata::extract_key(source.text());
                println!(
                    "📝 Composition updated ({} BPM, {})",
                    bpm,
                    key.as_deref().unwrap_or("key unknown")
                );
                if config.auto_play {
                    session.reload(source);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let frame = tap.read(TapKind::Time);
                if let Some(recorder) = recorder.as_mut() {
                    recorder.write_frame(&frame).map_err(|e| e.to_string())?;
                }
                print_meter(&frame, session.snapshot().state);
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    watcher.stop();
    Ok(())
}

/// One-shot: evaluate the file and keep the session alive for `duration`.
fn cmd_play(config: &SessionConfig, file: &Path, duration: f32) -> Result<(), String> {
    let code = fs::read_to_string(file).map_err(|e| e.to_string())?;

    let graph = Arc::new(Mutex::new(SimGraph::new(SAMPLE_RATE as f32)));
    let engine = Arc::new(SimEngine::new(Arc::clone(&graph)));
    let session = PlaybackSession::new(engine);

    let mut tap = GraphTap::new(Arc::clone(&graph), config.fft_size);
    if let Err(e) = tap.install() {
        warn!("visualizer tap unavailable: {e}");
    }

    session.play(CompositionSource::new(code));

    let deadline = Instant::now() + Duration::from_secs_f32(duration);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(250));
        let snapshot = session.snapshot();
        if snapshot.state == PlaybackState::Errored {
            let reason = snapshot
                .last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown engine error".to_string());
            return Err(reason);
        }
        print_meter(&tap.read(TapKind::Time), snapshot.state);
    }

    session.stop();
    Ok(())
}

fn cmd_meta(file: &Path) -> Result<(), String> {
    let code = fs::read_to_string(file).map_err(|e| e.to_string())?;
    let bpm = metadata::extract_bpm(&code);
    println!("BPM: {}", bpm.unwrap_or(120.0));
    if bpm.is_none() {
        println!("  (no tempo declared; default shown)");
    }
    match metadata::extract_key(&code) {
        Some(key) => println!("Key: {key}"),
        None => println!("Key: unknown"),
    }
    Ok(())
}

fn cmd_check(file: &Path) -> Result<(), String> {
    let code = fs::read_to_string(file).map_err(|e| e.to_string())?;
    SimEngine::check(&code).map_err(|e| e.to_string())?;
    println!("✅ {} evaluates cleanly", file.display());
    Ok(())
}

/// One-line RMS meter, the terminal stand-in for the waveform view.
fn print_meter(frame: &[f32], state: PlaybackState) {
    let rms = if frame.is_empty() {
        0.0
    } else {
        (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
    };
    let bars = ((rms * 60.0) as usize).min(30);
    println!("[{state:?}] |{:<30}|", "#".repeat(bars));
}
