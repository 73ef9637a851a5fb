//! # Batch Analysis Module
//!
//! Whole-track analyses (key, tempo, range) over a decoded buffer, and a
//! background worker that runs them off the live-update thread.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::block::DecodedBuffer;
use crate::key::{self, KeyEstimate};
use crate::range::{self, PitchRange};
use crate::tempo;

/// Static results for a loaded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// 0 when no beat was found
    pub bpm: u32,
    pub pitch_range: Option<PitchRange>,
    /// Empty when no range was found
    pub voice_type_labels: Vec<String>,
    pub key: KeyEstimate,
}

/// Runs all batch analyses synchronously.
pub fn analyze_buffer(buffer: &DecodedBuffer) -> BatchResult {
    let started = Instant::now();
    let samples = buffer.mono();
    let sample_rate = buffer.sample_rate();

    let key = key::estimate_key_from_buffer(&samples, sample_rate);
    let bpm = tempo::detect_bpm(&samples, sample_rate);
    let pitch_range = range::detect_pitch_range(&samples, sample_rate);
    let voice_type_labels = pitch_range
        .map(|r| {
            range::voice_types_from_range(r.min_frequency_hz, r.max_frequency_hz)
                .into_iter()
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    log::debug!(
        "Batch analysis of {} samples took {:?}: key={}, bpm={}, range={:?}",
        samples.len(),
        started.elapsed(),
        key,
        bpm,
        pitch_range.map(|r| (r.min_note.label(), r.max_note.label()))
    );

    BatchResult {
        bpm,
        pitch_range,
        voice_type_labels,
        key,
    }
}

/// A batch result tagged with the session generation that requested it.
pub type TaggedResult = (u64, BatchResult);

#[derive(Debug)]
struct BatchJob {
    generation: u64,
    buffer: DecodedBuffer,
}

/// Runs [`analyze_buffer`] on one long-lived background thread.
///
/// Jobs and results travel over crossbeam channels. The worker only ever
/// analyses the newest queued job, and skips any job (or finished result)
/// whose generation has been superseded by a later `submit` or `invalidate`.
#[derive(Debug)]
pub struct BatchWorker {
    job_sender: Sender<BatchJob>,
    result_receiver: Receiver<TaggedResult>,
    latest_generation: Arc<AtomicU64>,
}

impl Default for BatchWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchWorker {
    /// Spawns the worker thread. It exits once the worker is dropped.
    pub fn new() -> Self {
        let (job_sender, job_receiver) = crossbeam_channel::unbounded();
        let (result_sender, result_receiver) = crossbeam_channel::unbounded();
        let latest_generation = Arc::new(AtomicU64::new(0));

        let latest = Arc::clone(&latest_generation);
        thread::spawn(move || run_worker(job_receiver, result_sender, latest));

        Self {
            job_sender,
            result_receiver,
            latest_generation,
        }
    }

    /// Queues `buffer` for analysis under `generation`.
    pub fn submit(&self, generation: u64, buffer: DecodedBuffer) {
        self.invalidate(generation);
        if self
            .job_sender
            .send(BatchJob { generation, buffer })
            .is_err()
        {
            log::error!("Batch worker thread is gone; generation {generation} not analysed");
        }
    }

    /// Marks every generation below `generation` as stale.
    pub fn invalidate(&self, generation: u64) {
        self.latest_generation.fetch_max(generation, Ordering::SeqCst);
    }

    /// Returns a finished result, if any, without blocking.
    pub fn try_recv(&self) -> Option<TaggedResult> {
        self.result_receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next finished result.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TaggedResult> {
        match self.result_receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

fn run_worker(jobs: Receiver<BatchJob>, results: Sender<TaggedResult>, latest: Arc<AtomicU64>) {
    let is_stale = |generation: u64| generation < latest.load(Ordering::SeqCst);

    while let Ok(job) = jobs.recv() {
        // Older queued jobs are superseded by the newest one.
        let job = jobs.try_iter().last().unwrap_or(job);
        if is_stale(job.generation) {
            log::debug!("Skipping stale batch job (generation {})", job.generation);
            continue;
        }

        let result = analyze_buffer(&job.buffer);
        if is_stale(job.generation) {
            log::debug!("Dropping batch result for superseded generation {}", job.generation);
            continue;
        }
        if results.send((job.generation, result)).is_err() {
            break;
        }
    }
    log::debug!("Batch worker thread finished");
}
