//! # Vocal Live - command line front end
//!
//! Drives the analysis core from the microphone, or from a raw PCM file,
//! and prints one JSON object per line to stdout.
//!
//! ## Usage
//! ```text
//! vocal-live [--config settings.json] [--seconds 30]
//! vocal-live --pcm take.f32 [--rate 44100] [--config settings.json]
//! ```
//! `--pcm` expects headerless little-endian f32 mono samples.
//!
//! ## Architecture
//! - **Audio Thread**: CPAL callback framing samples into fixed-size blocks
//! - **Main Thread**: one analysis cycle per ~60 Hz tick
//! - **Batch Thread**: key/tempo/range analysis of a loaded file

mod audio;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cpal::traits::StreamTrait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use vocal_core::{AnalysisConfig, BatchResult, DecodedBuffer, FrameResult, SampleBlock, Session};

/// Interval between analysis cycles, roughly one display refresh.
const TICK: Duration = Duration::from_millis(16);
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_SECONDS: u64 = 30;
const BATCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser, Debug)]
#[command(name = "vocal-live")]
#[command(about = "Real-time vocal analysis from the microphone or a raw PCM file", long_about = None)]
struct Cli {
    /// JSON settings file (noise gate, gender, window size)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Headerless little-endian f32 mono samples to analyse instead of the microphone
    #[arg(long)]
    pcm: Option<PathBuf>,

    /// Sample rate of the --pcm file in Hz
    #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
    rate: u32,

    /// How long to listen in live mode, in seconds
    #[arg(short, long, default_value_t = DEFAULT_SECONDS)]
    seconds: u64,
}

/// One line of output.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Output<'a> {
    Frame(&'a FrameResult),
    Batch(&'a BatchResult),
}

fn emit(output: Output<'_>) -> Result<()> {
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    log::info!("Starting vocal analysis with {:?}", config);
    let mut session = Session::new(config)?;

    let result = match &cli.pcm {
        Some(path) => run_file(&mut session, path, cli.rate),
        None => run_live(&mut session, Duration::from_secs(cli.seconds)),
    };
    session.stop();
    log::info!("Analysis finished");
    result
}

/// Live mode: analyses the newest captured frame on every tick.
fn run_live(session: &mut Session, duration: Duration) -> Result<()> {
    let window = session.config().window_size;
    let (frame_tx, frame_rx) = crossbeam_channel::bounded(8);
    let (stream, sample_rate) = audio::start_audio_capture(frame_tx, window)?;

    session.start();
    let started = Instant::now();
    let ticker = crossbeam_channel::tick(TICK);
    while started.elapsed() < duration {
        ticker.recv()?;

        // Only the newest frame matters for display; older ones are skipped.
        let Some(frame) = frame_rx.try_iter().last() else {
            continue;
        };
        let block = SampleBlock::new(frame, sample_rate)?;
        let timestamp_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Some(result) = session.process_samples(&block, timestamp_ms)? {
            emit(Output::Frame(&result))?;
        }
    }

    stream.pause()?;
    Ok(())
}

fn read_pcm(path: &Path) -> Result<Vec<f32>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.len() % 4 != 0 {
        bail!("{} is not a whole number of f32 samples", path.display());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// File mode: batch analyses in the background while frames are "played".
fn run_file(session: &mut Session, path: &Path, sample_rate: u32) -> Result<()> {
    let samples = read_pcm(path)?;
    let buffer = DecodedBuffer::from_mono(samples, sample_rate)?;
    log::info!(
        "Loaded {} ({:.1} s)",
        path.display(),
        buffer.len() as f32 / sample_rate as f32
    );
    let playback = buffer.mono();
    session.load_source(buffer);

    let window = session.config().window_size;
    let mut batch_emitted = false;
    for (index, chunk) in playback.chunks_exact(window).enumerate() {
        let block = SampleBlock::new(chunk.to_vec(), sample_rate)?;
        let timestamp_ms = (index * window) as f64 * 1000.0 / sample_rate as f64;
        if let Some(result) = session.process_samples(&block, timestamp_ms)? {
            emit(Output::Frame(&result))?;
        }
        if !batch_emitted {
            if let Some(batch) = session.poll_batch() {
                emit(Output::Batch(batch))?;
                batch_emitted = true;
            }
        }
    }

    if !batch_emitted {
        match session.wait_for_batch(BATCH_TIMEOUT) {
            Some(batch) => emit(Output::Batch(batch))?,
            None => log::warn!("Batch analysis did not finish within {:?}", BATCH_TIMEOUT),
        }
    }
    Ok(())
}
