//! # Stabilization Module
//!
//! Small per-stream state machines that keep the displayed pitch and voice
//! label from flickering.
//!
//! - [`PitchStabilizer`] holds back single-frame octave jumps (harmonics,
//!   passing noise) until they persist.
//! - [`LabelDebouncer`] only replaces the shown label once a new candidate
//!   has repeated for long enough.

use crate::pitch::PitchEstimate;

/// A jump by more than this ratio (either direction) counts as an outlier.
pub const OCTAVE_JUMP_RATIO: f32 = 1.8;
/// Consecutive outlier frames needed before the jump is accepted.
pub const OUTLIER_FRAMES_TO_ACCEPT: u32 = 5;
/// A candidate label must repeat for more than this many frames.
pub const LABEL_DEBOUNCE_FRAMES: u32 = 10;

/// Octave-jump outlier rejection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PitchStabilizer {
    stable_frequency: Option<f32>,
    outlier_run_length: u32,
}

impl PitchStabilizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stable_frequency(&self) -> Option<f32> {
        self.stable_frequency
    }

    pub fn outlier_run_length(&self) -> u32 {
        self.outlier_run_length
    }

    /// Pure transition: the next state and the pitch to report for `raw`.
    ///
    /// Unvoiced frames are reported as unvoiced and leave the state alone.
    pub fn next(&self, raw: PitchEstimate) -> (Self, PitchEstimate) {
        let PitchEstimate::Voiced(freq) = raw else {
            return (*self, PitchEstimate::Unvoiced);
        };
        let accept = Self {
            stable_frequency: Some(freq),
            outlier_run_length: 0,
        };
        let Some(stable) = self.stable_frequency else {
            return (accept, raw);
        };

        let ratio = freq / stable;
        let is_jump = ratio > OCTAVE_JUMP_RATIO || ratio < 1.0 / OCTAVE_JUMP_RATIO;
        if !is_jump {
            return (accept, raw);
        }

        let run = self.outlier_run_length + 1;
        if run >= OUTLIER_FRAMES_TO_ACCEPT {
            (accept, raw)
        } else {
            let hold = Self {
                stable_frequency: Some(stable),
                outlier_run_length: run,
            };
            (hold, PitchEstimate::Voiced(stable))
        }
    }

    /// Feeds one raw pitch and returns the stabilized one.
    pub fn update(&mut self, raw: PitchEstimate) -> PitchEstimate {
        let (state, output) = self.next(raw);
        *self = state;
        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Debounces a displayed value such as the voice-type label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDebouncer<T> {
    current: Option<T>,
    candidate: Option<T>,
    run_length: u32,
    threshold: u32,
}

impl<T> Default for LabelDebouncer<T> {
    fn default() -> Self {
        Self::new(LABEL_DEBOUNCE_FRAMES)
    }
}

impl<T> LabelDebouncer<T> {
    /// A candidate replaces the current value after more than `threshold` repeats.
    pub fn new(threshold: u32) -> Self {
        Self {
            current: None,
            candidate: None,
            run_length: 0,
            threshold,
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.candidate = None;
        self.run_length = 0;
    }
}

impl<T: Clone + PartialEq> LabelDebouncer<T> {
    /// Feeds one voiced frame's label and returns the label to display.
    ///
    /// The very first label is shown immediately.
    pub fn update(&mut self, label: T) -> &T {
        let promote = match &self.current {
            None => true,
            Some(current) if *current == label => {
                self.candidate = None;
                self.run_length = 0;
                false
            }
            Some(_) => {
                if self.candidate.as_ref() == Some(&label) {
                    self.run_length += 1;
                } else {
                    self.candidate = Some(label.clone());
                    self.run_length = 1;
                }
                self.run_length > self.threshold
            }
        };
        if promote {
            self.current = None;
            self.candidate = None;
            self.run_length = 0;
        }
        self.current.get_or_insert(label)
    }
}
