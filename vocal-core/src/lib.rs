// vocal-core/src/lib.rs

//! The core logic for the vocal analyzer.
//! This crate turns PCM audio into pitch, key, tempo, register and vibrato
//! estimates. It is completely headless and does no audio I/O; a capture
//! or decoding layer hands it samples and consumes the structured results.

pub mod batch;
pub mod block;
pub mod config;
pub mod error;
pub mod fft;
pub mod key;
pub mod pitch;
pub mod range;
pub mod session;
pub mod stabilizer;
pub mod tempo;
pub mod tuning;
pub mod vibrato;
pub mod voice;

use serde::{Deserialize, Serialize};

pub use batch::BatchResult;
pub use block::{DecodedBuffer, SampleBlock, SpectrumBlock};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, AnalysisResult};
pub use session::Session;

/// Display color hint attached to graded results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Green,
    Yellow,
    Orange,
    Red,
    Gray,
}

/// Represents the result of a single live analysis frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// Stabilized frequency in Hz, `None` when unvoiced.
    pub frequency_hz: Option<f32>,
    /// The nearest note.
    pub note: Option<tuning::NoteEstimate>,
    /// Deviation from the nearest note, clamped to ±50.
    pub cents: Option<i32>,
    /// Fractional MIDI note number.
    pub exact_midi: Option<f32>,
    /// Equal-tempered frequency of the nearest note.
    pub target_frequency_hz: Option<f32>,
    /// Debounced register label.
    pub voice_type: Option<voice::VoiceTypeResult>,
    pub volume_rms: f32,
    pub estimated_key: key::KeyEstimate,
    pub vibrato: vibrato::VibratoReport,
}
