//! # Vocal Range Module
//!
//! Finds the lowest and highest sung notes of a decoded buffer and maps
//! them to coarse voice categories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pitch;
use crate::tuning::{self, NoteEstimate};

pub const RANGE_WINDOW: usize = 2048;
pub const RANGE_HOP: usize = 8192;
/// Windows at or below this RMS are skipped.
pub const RANGE_SILENCE_RMS: f32 = 0.02;
pub const RANGE_MIN_HZ: f32 = 70.0;
pub const RANGE_MAX_HZ: f32 = 1100.0;
/// Voiced windows needed before a range is reported.
pub const MIN_VOICED_FRAMES: usize = 10;
/// MIDI bins holding less than this share of voiced frames are noise.
pub const NOISE_FRACTION: f32 = 0.005;

/// Label used when no voice band fits.
pub const GENERIC_VOICE_LABEL: &str = "Singer";

/// Voice categories with their typical (low, high) range in Hz.
const VOICE_BANDS: [(&str, f32, f32); 5] = [
    ("Bass", 82.0, 330.0),
    ("Baritone", 110.0, 392.0),
    ("Tenor", 130.0, 523.0),
    ("Alto", 175.0, 698.0),
    ("Soprano", 262.0, 1047.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchRange {
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    pub min_note: NoteEstimate,
    pub max_note: NoteEstimate,
}

/// Detects the sung range of a decoded mono buffer.
///
/// # Returns
/// * `Some(range)` - Lowest and highest MIDI notes that survive noise filtering
/// * `None` - Fewer than `MIN_VOICED_FRAMES` voiced windows
pub fn detect_pitch_range(samples: &[f32], sample_rate: u32) -> Option<PitchRange> {
    let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
    let mut voiced_frames = 0usize;

    let mut start = 0;
    while start + RANGE_WINDOW <= samples.len() {
        let window = &samples[start..start + RANGE_WINDOW];
        start += RANGE_HOP;
        if pitch::rms(window) <= RANGE_SILENCE_RMS {
            continue;
        }
        let estimate = pitch::detect_pitch_in_band(window, sample_rate, RANGE_MIN_HZ, RANGE_MAX_HZ);
        if let Some(note) = tuning::from_pitch(estimate) {
            *histogram.entry(note.midi).or_insert(0) += 1;
            voiced_frames += 1;
        }
    }

    if voiced_frames < MIN_VOICED_FRAMES {
        log::debug!("Range analysis found only {voiced_frames} voiced frames");
        return None;
    }

    let min_count = voiced_frames as f32 * NOISE_FRACTION;
    let mut surviving = histogram
        .iter()
        .filter(|&(_, &count)| count as f32 >= min_count)
        .map(|(&midi, _)| midi);
    let low = surviving.next()?;
    let high = surviving.last().unwrap_or(low);

    let min_note = tuning::note_from_midi(low);
    let max_note = tuning::note_from_midi(high);
    Some(PitchRange {
        min_frequency_hz: min_note.target_frequency_hz,
        max_frequency_hz: max_note.target_frequency_hz,
        min_note,
        max_note,
    })
}

/// Maps a sung range to at most two voice categories.
///
/// A category matches when the range fits inside its band with some slack.
/// Among matches, the two whose band centre is closest (in octaves) to the
/// centre of the sung range win, lower voice first.
pub fn voice_types_from_range(min_hz: f32, max_hz: f32) -> Vec<&'static str> {
    if !(min_hz > 0.0 && max_hz >= min_hz) {
        return vec![GENERIC_VOICE_LABEL];
    }
    let center = (min_hz * max_hz).sqrt();

    let mut matches: Vec<(usize, f32)> = VOICE_BANDS
        .iter()
        .enumerate()
        .filter(|&(_, &(_, low, high))| min_hz >= low * 0.85 && max_hz <= high * 1.15)
        .map(|(i, &(_, low, high))| (i, ((low * high).sqrt() / center).log2().abs()))
        .collect();
    if matches.is_empty() {
        return vec![GENERIC_VOICE_LABEL];
    }
    matches.sort_by(|a, b| a.1.total_cmp(&b.1));
    matches.truncate(2);
    matches.sort_by_key(|&(i, _)| i);
    matches.into_iter().map(|(i, _)| VOICE_BANDS[i].0).collect()
}
