//! # Key Estimation Module
//!
//! Correlates a 12-bin pitch-class histogram (chroma) against major and
//! minor tonal profiles.
//!
//! ## Features
//! - Incremental accumulation, one detected note per frame
//! - Batch estimation over a fully decoded buffer
//! - Deterministic tie-break: major keys before minor, lowest tonic first

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pitch;
use crate::tuning::{self, PitchClass};

/// Notes needed before a key is reported.
pub const MIN_KEY_SAMPLES: u64 = 10;

/// Score differences at or below this are treated as ties.
const TIE_TOLERANCE: f64 = 1e-9;

/// Batch analysis window and hop, in samples.
pub const BATCH_WINDOW: usize = 4096;
pub const BATCH_HOP: usize = 8192;
/// Windows at or below this RMS are skipped in batch mode.
pub const BATCH_SILENCE_RMS: f32 = 0.05;
/// Vocal-plausible pitch band for batch mode, in Hz.
pub const BATCH_MIN_HZ: f32 = 60.0;
pub const BATCH_MAX_HZ: f32 = 2000.0;

/// Krumhansl-Kessler probe-tone profile for major keys, tonic first.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler probe-tone profile for minor keys, tonic first.
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Major => f.write_str("Major"),
            Mode::Minor => f.write_str("Minor"),
        }
    }
}

/// One of the 24 major/minor keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: Mode,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KeyEstimate {
    /// Fewer than `MIN_KEY_SAMPLES` notes seen so far
    InsufficientData,
    Key(Key),
}

impl KeyEstimate {
    pub fn key(&self) -> Option<Key> {
        match *self {
            KeyEstimate::Key(key) => Some(key),
            KeyEstimate::InsufficientData => None,
        }
    }
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyEstimate::InsufficientData => f.write_str("Not enough data"),
            KeyEstimate::Key(key) => write!(f, "{key}"),
        }
    }
}

/// All 24 keys with their profile rotated onto absolute pitch classes,
/// in evaluation order.
static KEY_PROFILES: Lazy<Vec<(Key, [f64; 12])>> = Lazy::new(|| {
    let mut profiles = Vec::with_capacity(24);
    for (mode, profile) in [(Mode::Major, &MAJOR_PROFILE), (Mode::Minor, &MINOR_PROFILE)] {
        for tonic in PitchClass::ALL {
            let mut rotated = [0.0; 12];
            for (pc, weight) in rotated.iter_mut().enumerate() {
                *weight = profile[(pc + 12 - tonic.index()) % 12];
            }
            profiles.push((Key { tonic, mode }, rotated));
        }
    }
    profiles
});

/// Per-stream chroma accumulator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyEstimator {
    chroma: [u64; 12],
    total: u64,
}

impl KeyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one detected note.
    pub fn process_note(&mut self, pitch_class: PitchClass) {
        self.chroma[pitch_class.index()] += 1;
        self.total += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Chroma normalised by the total count; all zeros before any note.
    pub fn chroma(&self) -> [f64; 12] {
        let mut normalized = [0.0; 12];
        if self.total == 0 {
            return normalized;
        }
        for (out, &count) in normalized.iter_mut().zip(&self.chroma) {
            *out = count as f64 / self.total as f64;
        }
        normalized
    }

    /// Best matching key for everything accumulated so far.
    pub fn estimate_key(&self) -> KeyEstimate {
        if self.total < MIN_KEY_SAMPLES {
            return KeyEstimate::InsufficientData;
        }
        let chroma = self.chroma();

        let mut best: Option<(Key, f64)> = None;
        for (key, profile) in KEY_PROFILES.iter() {
            let score: f64 = chroma.iter().zip(profile).map(|(c, p)| c * p).sum();
            // Summation order differs per rotation, so equal scores can differ
            // in the last bits. Only a clear win displaces the earlier key.
            if best.is_none_or(|(_, best_score)| score > best_score + TIE_TOLERANCE) {
                best = Some((*key, score));
            }
        }
        match best {
            Some((key, _)) => KeyEstimate::Key(key),
            None => KeyEstimate::InsufficientData,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Estimates one static key for a whole decoded track.
pub fn estimate_key_from_buffer(samples: &[f32], sample_rate: u32) -> KeyEstimate {
    let mut estimator = KeyEstimator::new();
    let mut start = 0;
    while start + BATCH_WINDOW <= samples.len() {
        let window = &samples[start..start + BATCH_WINDOW];
        start += BATCH_HOP;
        if pitch::rms(window) <= BATCH_SILENCE_RMS {
            continue;
        }
        let estimate =
            pitch::detect_pitch_in_band(window, sample_rate, BATCH_MIN_HZ, BATCH_MAX_HZ);
        if let Some(note) = tuning::from_pitch(estimate) {
            estimator.process_note(note.name);
        }
    }
    log::debug!(
        "Batch key estimation used {} voiced windows",
        estimator.total()
    );
    estimator.estimate_key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn c_major_triad_is_c_major() {
        let mut estimator = KeyEstimator::new();
        let triad = [PitchClass::C, PitchClass::E, PitchClass::G];
        for i in 0..1000 {
            estimator.process_note(triad[(i * 7) % 3]);
        }
        assert_eq!(
            estimator.estimate_key(),
            KeyEstimate::Key(Key {
                tonic: PitchClass::C,
                mode: Mode::Major
            })
        );
        assert_eq!(estimator.estimate_key().to_string(), "C Major");
    }

    #[test]
    fn a_minor_triad_is_a_minor() {
        let mut estimator = KeyEstimator::new();
        for _ in 0..20 {
            estimator.process_note(PitchClass::A);
            estimator.process_note(PitchClass::A);
            estimator.process_note(PitchClass::C);
            estimator.process_note(PitchClass::E);
        }
        assert_eq!(estimator.estimate_key().to_string(), "A Minor");
    }

    #[test]
    fn needs_ten_notes() {
        let mut estimator = KeyEstimator::new();
        for _ in 0..9 {
            estimator.process_note(PitchClass::D);
            assert_eq!(estimator.estimate_key(), KeyEstimate::InsufficientData);
        }
        estimator.process_note(PitchClass::D);
        assert!(estimator.estimate_key().key().is_some());
    }

    #[test]
    fn reset_clears_counters() {
        let mut estimator = KeyEstimator::new();
        let before = estimator.estimate_key();
        for _ in 0..50 {
            estimator.process_note(PitchClass::G);
        }
        estimator.reset();
        assert_eq!(estimator, KeyEstimator::new());
        assert_eq!(estimator.estimate_key(), before);
        assert_eq!(estimator.chroma(), [0.0; 12]);
    }

    #[test]
    fn uniform_chroma_resolves_to_first_minor_key() {
        let mut estimator = KeyEstimator::new();
        for _ in 0..5 {
            for pc in PitchClass::ALL {
                estimator.process_note(pc);
            }
        }
        // Every minor key scores the same and beats every major key.
        assert_eq!(estimator.estimate_key().to_string(), "C Minor");
    }

    #[test]
    fn symmetric_chord_resolves_to_lowest_tonic() {
        let mut estimator = KeyEstimator::new();
        // The diminished seventh maps onto itself under minor-third rotation,
        // so C, D#, F# and A minor tie.
        let chord = [PitchClass::C, PitchClass::DSharp, PitchClass::FSharp, PitchClass::A];
        for _ in 0..10 {
            for pc in chord {
                estimator.process_note(pc);
            }
        }
        assert_eq!(estimator.estimate_key().to_string(), "C Minor");
    }

    #[test]
    fn batch_estimation_over_sung_notes() {
        let sample_rate = 16000;
        // C4 E4 G4 C5, each held for two seconds
        let notes = [261.63, 329.63, 392.0, 523.25];
        let mut samples = Vec::new();
        for freq in notes {
            samples.extend(
                (0..2 * sample_rate)
                    .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin()),
            );
        }
        assert_eq!(
            estimate_key_from_buffer(&samples, sample_rate as u32).to_string(),
            "C Major"
        );
    }

    #[test]
    fn silent_buffer_has_no_key() {
        let samples = vec![0.0; 100_000];
        assert_eq!(
            estimate_key_from_buffer(&samples, 44100),
            KeyEstimate::InsufficientData
        );
    }
}
