//! # Voice Type Module
//!
//! Heuristic vocal-register classification from pitch, brightness and
//! loudness. Rules run in a fixed order and later rules override earlier
//! ones; that order is part of the behaviour.

use serde::{Deserialize, Serialize};

use crate::ColorTag;

/// Below this pitch the frame is reported as silence.
pub const MIN_VOICE_PITCH: f32 = 50.0;
/// Suffix appended to the label of a strained sound.
pub const STRAIN_MARKER: &str = " (Strain)";

/// Assumed singer voice, which moves the register breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    /// (chest to mix, mix to head) breakpoints in Hz.
    pub fn register_breaks(self) -> (f32, f32) {
        match self {
            Gender::Male => (300.0, 450.0),
            Gender::Female => (420.0, 700.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceTypeResult {
    pub label: String,
    /// 0.0 to 1.0
    pub confidence: f32,
    pub is_straining: bool,
    pub color: ColorTag,
}

impl VoiceTypeResult {
    fn new(label: &str, confidence: f32, color: ColorTag) -> Self {
        Self {
            label: label.to_string(),
            confidence,
            is_straining: false,
            color,
        }
    }

    pub fn silence() -> Self {
        Self::new("Silence", 0.0, ColorTag::Gray)
    }
}

/// Classifies one frame.
///
/// # Arguments
/// * `pitch_hz` - Stabilized fundamental
/// * `centroid_hz` - Spectral centroid of the same frame
/// * `rms` - Frame loudness
/// * `gender` - Selects the register breakpoints
pub fn classify_voice_type(
    pitch_hz: f32,
    centroid_hz: f32,
    rms: f32,
    gender: Gender,
) -> VoiceTypeResult {
    if !pitch_hz.is_finite() || pitch_hz < MIN_VOICE_PITCH {
        return VoiceTypeResult::silence();
    }
    let (lower_break, upper_break) = gender.register_breaks();

    let mut result = if pitch_hz < lower_break {
        let mut result = VoiceTypeResult::new("Chest Voice", 0.8, ColorTag::Green);
        if centroid_hz > 3000.0 {
            result = VoiceTypeResult::new("Pressed Voice", 0.6, ColorTag::Orange);
        }
        if centroid_hz > 0.0 && centroid_hz < pitch_hz * 1.5 {
            // Few harmonics above the fundamental.
            result = VoiceTypeResult::new("Pure Tone", 0.5, ColorTag::Yellow);
        }
        result
    } else if pitch_hz < upper_break {
        let mut result = VoiceTypeResult::new("Mix Voice", 0.7, ColorTag::Green);
        if centroid_hz > 2500.0 && rms > 0.15 {
            result = VoiceTypeResult::new("Chest-Dominant Mix", 0.7, ColorTag::Yellow);
        } else if centroid_hz < 1200.0 && rms < 0.1 {
            result = VoiceTypeResult::new("Head-Dominant Mix", 0.7, ColorTag::Green);
        }
        result
    } else {
        let mut result = VoiceTypeResult::new("Head Voice", 0.8, ColorTag::Green);
        if centroid_hz > 0.0 && centroid_hz < pitch_hz * 1.5 && rms < 0.05 {
            result = VoiceTypeResult::new("Falsetto", 0.6, ColorTag::Yellow);
        }
        if centroid_hz > 3000.0 && rms > 0.2 {
            result = VoiceTypeResult::new("Belt", 0.7, ColorTag::Orange);
        }
        result
    };

    let loud_and_harsh = rms > 0.3 && centroid_hz > 4000.0;
    let pushed_high = pitch_hz > upper_break * 1.1 && rms > 0.2 && centroid_hz > 3000.0;
    if loud_and_harsh || pushed_high {
        result.is_straining = true;
        result.label.push_str(STRAIN_MARKER);
        result.color = ColorTag::Red;
    }
    result
}
