//! Error types for malformed input handed to the analysis core.
//!
//! Quiet frames, short histories and other "not enough signal" conditions are
//! not errors; they are reported through explicit result states instead.

use thiserror::Error;

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Contract violations by the capture or decoding collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Sample rate below the supported minimum
    #[error("Unsupported sample rate: {0} Hz (minimum is 8000 Hz)")]
    InvalidSampleRate(u32),

    /// Block with no samples
    #[error("Sample block is empty")]
    EmptyBlock,

    /// Analysis windows must be a power of two
    #[error("Block length {0} is not a power of two")]
    BlockLengthNotPowerOfTwo(usize),

    /// Block length differs from the session's analysis window
    #[error("Block length mismatch: expected {expected}, got {actual}")]
    BlockLengthMismatch { expected: usize, actual: usize },

    /// NaN or infinite sample value
    #[error("Non-finite sample value at index {index}")]
    NonFiniteSample { index: usize },

    /// Spectrum does not belong to the sample block it was paired with
    #[error("Spectrum mismatch: expected {expected} bins, got {actual}")]
    SpectrumMismatch { expected: usize, actual: usize },

    /// Decoded buffer without any channel data
    #[error("Decoded buffer has no channels")]
    NoChannels,

    /// Channels of a decoded buffer must all have the same length
    #[error("Channel {channel} has {actual} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    /// Configuration value outside its accepted range
    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}
