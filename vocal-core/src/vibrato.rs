//! # Vibrato Analysis Module
//!
//! Tracks the last second of pitch and measures the rate and depth of any
//! periodic modulation around its mean.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::ColorTag;
use crate::tuning;

/// Length of the sliding pitch history.
pub const HISTORY_WINDOW_MS: f64 = 1000.0;
/// Pitches at or below this are dropped instead of recorded.
pub const MIN_PLAUSIBLE_PITCH: f32 = 50.0;
/// Minimum retained samples for an analysis.
pub const MIN_SAMPLES: usize = 20;
/// Minimum time span of the retained samples.
pub const MIN_SPAN_MS: f64 = 200.0;

/// Vibrato quality rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VibratoQuality {
    None,
    Great,
    TooFast,
    TooSlow,
    Shallow,
    Ok,
}

impl VibratoQuality {
    pub fn color(self) -> ColorTag {
        match self {
            VibratoQuality::None => ColorTag::Gray,
            VibratoQuality::Great => ColorTag::Green,
            VibratoQuality::Ok => ColorTag::Yellow,
            VibratoQuality::Shallow => ColorTag::Orange,
            VibratoQuality::TooFast | VibratoQuality::TooSlow => ColorTag::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VibratoReport {
    pub is_vibrato: bool,
    pub rate_hz: f32,
    pub depth_cents: f32,
    pub quality: VibratoQuality,
    pub color: ColorTag,
}

impl VibratoReport {
    /// Report for a history too short to judge.
    pub fn none() -> Self {
        Self {
            is_vibrato: false,
            rate_hz: 0.0,
            depth_cents: 0.0,
            quality: VibratoQuality::None,
            color: VibratoQuality::None.color(),
        }
    }

    /// Classifies a measured rate and depth.
    ///
    /// Vibrato: rate in `[3, 9]` Hz and depth in `(10, 250)` cents.
    /// Great: rate in `[5.5, 7.5]` and depth in `[30, 120]`.
    pub fn classify(rate_hz: f32, depth_cents: f32) -> Self {
        let is_vibrato =
            (3.0..=9.0).contains(&rate_hz) && depth_cents > 10.0 && depth_cents < 250.0;
        let quality = if !is_vibrato {
            VibratoQuality::None
        } else if (5.5..=7.5).contains(&rate_hz) && (30.0..=120.0).contains(&depth_cents) {
            VibratoQuality::Great
        } else if rate_hz > 7.5 {
            VibratoQuality::TooFast
        } else if rate_hz < 5.5 {
            VibratoQuality::TooSlow
        } else if depth_cents < 30.0 {
            VibratoQuality::Shallow
        } else {
            VibratoQuality::Ok
        };
        Self {
            is_vibrato,
            rate_hz,
            depth_cents,
            quality,
            color: quality.color(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PitchSample {
    timestamp_ms: f64,
    pitch_hz: f32,
}

/// Per-stream vibrato detector over a one-second pitch history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VibratoAnalyzer {
    history: VecDeque<PitchSample>,
}

impl VibratoAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prunes samples older than one second, then records `pitch_hz` if plausible.
    pub fn update(&mut self, pitch_hz: f32, timestamp_ms: f64) {
        self.prune(timestamp_ms);
        if pitch_hz.is_finite() && pitch_hz > MIN_PLAUSIBLE_PITCH {
            self.history.push_back(PitchSample {
                timestamp_ms,
                pitch_hz,
            });
        }
    }

    /// Drops samples more than one second older than `timestamp_ms`.
    pub fn prune(&mut self, timestamp_ms: f64) {
        while let Some(front) = self.history.front() {
            if timestamp_ms - front.timestamp_ms > HISTORY_WINDOW_MS {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Measures rate (zero crossings around the mean) and depth (max/min spread).
    pub fn analyze(&self) -> VibratoReport {
        let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
            return VibratoReport::none();
        };
        let span_ms = last.timestamp_ms - first.timestamp_ms;
        if self.history.len() < MIN_SAMPLES || span_ms < MIN_SPAN_MS {
            return VibratoReport::none();
        }

        let count = self.history.len() as f32;
        let mean = self.history.iter().map(|s| s.pitch_hz).sum::<f32>() / count;

        let mut crossings = 0u32;
        let mut previous_sign = 0.0f32;
        for sample in &self.history {
            let centered = sample.pitch_hz - mean;
            if centered == 0.0 {
                continue;
            }
            let sign = centered.signum();
            if previous_sign != 0.0 && sign != previous_sign {
                crossings += 1;
            }
            previous_sign = sign;
        }
        let rate_hz = (crossings as f32 / 2.0) / (span_ms / 1000.0) as f32;

        let (min, max) = self
            .history
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), s| {
                (min.min(s.pitch_hz), max.max(s.pitch_hz))
            });
        let depth_cents = tuning::calculate_cents_deviation(max, min);

        VibratoReport::classify(rate_hz, depth_cents)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}
