//! # Musical Tuning Module
//!
//! Maps frequencies onto 12-tone equal temperament referenced to A4 = 440 Hz.
//!
//! ## Features
//! - Frequency to nearest note, octave and MIDI number
//! - Cent deviation from the nearest note
//! - Exact target frequency for tuner feedback

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pitch::PitchEstimate;

/// Reference pitch for A4.
pub const A4_FREQUENCY: f32 = 440.0;
/// MIDI number of A4.
pub const A4_MIDI: i32 = 69;
/// Frequencies below this are treated as measurement noise.
pub const MIN_AUDIBLE_FREQUENCY: f32 = 20.0;

/// The twelve pitch classes, C = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class of any (possibly negative) semitone index.
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        const NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        NAMES[self.index()]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Nearest equal-tempered note to a measured frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEstimate {
    pub name: PitchClass,
    pub octave: i32,
    pub midi: i32,
    /// Deviation from the note, truncated toward zero.
    pub cents: i32,
    /// Fractional note number of the measured frequency.
    pub exact_midi: f32,
    /// Equal-tempered frequency of `midi`.
    pub target_frequency_hz: f32,
}

impl NoteEstimate {
    /// Scientific pitch label, e.g. "A4" or "C#3".
    pub fn label(&self) -> String {
        format!("{}{}", self.name, self.octave)
    }

    /// Cents clamped to the ±50 range a tuner needle shows.
    pub fn display_cents(&self) -> i32 {
        self.cents.clamp(-50, 50)
    }
}

/// Fractional MIDI note number of a frequency.
pub fn frequency_to_midi(freq: f32) -> f32 {
    A4_MIDI as f32 + 12.0 * (freq / A4_FREQUENCY).log2()
}

/// Equal-tempered frequency of a MIDI note: `440 * 2^((midi - 69) / 12)`.
pub fn midi_to_frequency(midi: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Builds the note for an exact MIDI number, with zero deviation.
pub fn note_from_midi(midi: i32) -> NoteEstimate {
    NoteEstimate {
        name: PitchClass::from_index(midi),
        octave: midi.div_euclid(12) - 1,
        midi,
        cents: 0,
        exact_midi: midi as f32,
        target_frequency_hz: midi_to_frequency(midi),
    }
}

/// Finds the nearest note to a frequency.
///
/// # Returns
/// * `Some(note)` - Nearest note with its cent deviation
/// * `None` - Frequency is not finite or below 20 Hz
pub fn from_frequency(freq: f32) -> Option<NoteEstimate> {
    if !freq.is_finite() || freq < MIN_AUDIBLE_FREQUENCY {
        return None;
    }
    let exact_midi = frequency_to_midi(freq);
    let midi = exact_midi.round() as i32;
    let cents = ((exact_midi - midi as f32) * 100.0).trunc() as i32;
    Some(NoteEstimate {
        cents,
        exact_midi,
        ..note_from_midi(midi)
    })
}

/// [`from_frequency`] for a pitch measurement; unvoiced maps to `None`.
pub fn from_pitch(pitch: PitchEstimate) -> Option<NoteEstimate> {
    pitch.frequency().and_then(from_frequency)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
