//! # Session Module
//!
//! Owns the per-stream state of one listening or playback session and runs
//! the live analysis cycle over it.
//!
//! Lifecycle: `new` → `start` (or `load_source`) → `process_frame` once per
//! tick → `stop`. Stopping or loading a new source replaces every
//! accumulator with a fresh one, and batch results requested before that
//! point are dropped when they arrive.

use std::time::{Duration, Instant};

use crate::batch::{BatchResult, BatchWorker};
use crate::block::{DecodedBuffer, SampleBlock, SpectrumBlock};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::key::{KeyEstimate, KeyEstimator};
use crate::pitch::{self, PitchEstimate};
use crate::stabilizer::{LabelDebouncer, PitchStabilizer};
use crate::vibrato::{VibratoAnalyzer, VibratoReport};
use crate::voice::{self, VoiceTypeResult};
use crate::fft::SpectrumAnalyzer;
use crate::{FrameResult, tuning};

/// Stateful components, one set per stream.
#[derive(Debug, Default)]
struct StreamState {
    stabilizer: PitchStabilizer,
    voice_label: LabelDebouncer<String>,
    key: KeyEstimator,
    vibrato: VibratoAnalyzer,
}

#[derive(Debug)]
pub struct Session {
    config: AnalysisConfig,
    state: StreamState,
    active: bool,
    generation: u64,
    worker: BatchWorker,
    batch: Option<BatchResult>,
    spectrum: SpectrumAnalyzer,
}

impl Session {
    pub fn new(config: AnalysisConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: StreamState::default(),
            active: false,
            generation: 0,
            worker: BatchWorker::new(),
            batch: None,
            spectrum: SpectrumAnalyzer::new(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Replaces the configuration; used from the next frame on.
    pub fn set_config(&mut self, config: AnalysisConfig) -> AnalysisResult<()> {
        config.validate()?;
        log::debug!("Session config updated: {:?}", config);
        self.config = config;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starts a live session with fresh accumulators.
    pub fn start(&mut self) {
        self.state = StreamState::default();
        self.active = true;
        log::debug!("Session started (generation {})", self.generation);
    }

    /// Halts analysis and discards all session-owned state.
    pub fn stop(&mut self) {
        self.active = false;
        self.invalidate();
        log::debug!("Session stopped");
    }

    /// Loads a decoded track: resets the live state, starts the session and
    /// queues the batch analyses in the background.
    pub fn load_source(&mut self, buffer: DecodedBuffer) {
        self.invalidate();
        self.active = true;
        log::debug!(
            "Loading source of {} samples at {} Hz (generation {})",
            buffer.len(),
            buffer.sample_rate(),
            self.generation
        );
        self.worker.submit(self.generation, buffer);
    }

    fn invalidate(&mut self) {
        self.state = StreamState::default();
        self.batch = None;
        self.generation += 1;
        self.worker.invalidate(self.generation);
    }

    /// Collects a finished batch analysis for the current source, if any.
    pub fn poll_batch(&mut self) -> Option<&BatchResult> {
        while let Some((generation, result)) = self.worker.try_recv() {
            self.accept_batch(generation, result);
        }
        self.batch.as_ref()
    }

    /// Blocks up to `timeout` for the current source's batch result.
    pub fn wait_for_batch(&mut self, timeout: Duration) -> Option<&BatchResult> {
        let deadline = Instant::now() + timeout;
        while self.batch.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.worker.recv_timeout(remaining) {
                Some((generation, result)) => self.accept_batch(generation, result),
                None => break,
            }
        }
        self.batch.as_ref()
    }

    fn accept_batch(&mut self, generation: u64, result: BatchResult) {
        if generation == self.generation {
            self.batch = Some(result);
        } else {
            log::warn!(
                "Discarding stale batch result (generation {generation}, current {})",
                self.generation
            );
        }
    }

    /// Current incremental key estimate.
    pub fn estimated_key(&self) -> KeyEstimate {
        self.state.key.estimate_key()
    }

    /// Current vibrato report.
    pub fn vibrato(&self) -> VibratoReport {
        self.state.vibrato.analyze()
    }

    /// Runs one live analysis cycle.
    ///
    /// # Returns
    /// * `Ok(Some(result))` - Analysis of this frame
    /// * `Ok(None)` - Session is stopped; the block was dropped unprocessed
    ///
    /// # Errors
    /// * `BlockLengthMismatch` if the block is not `window_size` long
    /// * `SpectrumMismatch` if the spectrum does not belong to the block
    pub fn process_frame(
        &mut self,
        block: &SampleBlock,
        spectrum: &SpectrumBlock,
        timestamp_ms: f64,
    ) -> AnalysisResult<Option<FrameResult>> {
        if !self.active {
            log::trace!("Dropping frame at {timestamp_ms} ms: session stopped");
            return Ok(None);
        }
        if block.len() != self.config.window_size {
            return Err(AnalysisError::BlockLengthMismatch {
                expected: self.config.window_size,
                actual: block.len(),
            });
        }
        spectrum.check_matches(block)?;

        let volume_rms = pitch::rms(block.samples());
        let raw = if volume_rms < self.config.noise_gate_rms {
            PitchEstimate::Unvoiced
        } else {
            pitch::detect_pitch(block)
        };
        let stable = self.state.stabilizer.update(raw);
        let note = tuning::from_pitch(stable);

        let voice_type = match (stable.frequency(), note) {
            (Some(freq), Some(note)) => {
                self.state.vibrato.update(freq, timestamp_ms);
                self.state.key.process_note(note.name);
                let centroid = pitch::spectral_centroid(spectrum);
                self.debounced_voice_type(freq, centroid, volume_rms)
            }
            _ => {
                self.state.vibrato.prune(timestamp_ms);
                None
            }
        };

        Ok(Some(FrameResult {
            frequency_hz: stable.frequency(),
            cents: note.map(|n| n.display_cents()),
            exact_midi: note.map(|n| n.exact_midi),
            target_frequency_hz: note.map(|n| n.target_frequency_hz),
            note,
            voice_type,
            volume_rms,
            estimated_key: self.state.key.estimate_key(),
            vibrato: self.state.vibrato.analyze(),
        }))
    }

    /// [`Session::process_frame`] for capture layers without their own FFT.
    pub fn process_samples(
        &mut self,
        block: &SampleBlock,
        timestamp_ms: f64,
    ) -> AnalysisResult<Option<FrameResult>> {
        if !self.active {
            return Ok(None);
        }
        let spectrum = self.spectrum.analyze(block)?;
        self.process_frame(block, &spectrum, timestamp_ms)
    }

    /// Classifies the frame and debounces the label text. Confidence and
    /// color follow the current frame.
    fn debounced_voice_type(
        &mut self,
        freq: f32,
        centroid: f32,
        volume_rms: f32,
    ) -> Option<VoiceTypeResult> {
        let raw = voice::classify_voice_type(freq, centroid, volume_rms, self.config.gender);
        if raw == VoiceTypeResult::silence() {
            return None;
        }
        let label = self.state.voice_label.update(raw.label.clone()).clone();
        Some(VoiceTypeResult { label, ..raw })
    }
}
