//! # Audio Block Module
//!
//! Input containers handed to the core by the capture and decoding layers.
//! Every constructor validates its input once, so the analysis stages can
//! assume finite samples and a usable sample rate.

use crate::error::{AnalysisError, AnalysisResult};

/// Default number of samples per live analysis frame.
///
/// At 44.1 kHz this is about 46 ms of audio, enough for two periods of
/// the lowest sung notes.
pub const BUFFER_SIZE: usize = 2048;

/// Lowest sample rate the analyzers are tuned for.
pub const MIN_SAMPLE_RATE: u32 = 8000;

fn check_sample_rate(sample_rate: u32) -> AnalysisResult<()> {
    if sample_rate < MIN_SAMPLE_RATE {
        return Err(AnalysisError::InvalidSampleRate(sample_rate));
    }
    Ok(())
}

fn check_finite(samples: &[f32]) -> AnalysisResult<()> {
    match samples.iter().position(|s| !s.is_finite()) {
        Some(index) => Err(AnalysisError::NonFiniteSample { index }),
        None => Ok(()),
    }
}

/// A fixed-size block of time-domain samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBlock {
    /// Wraps captured samples.
    ///
    /// # Errors
    /// * `EmptyBlock` / `BlockLengthNotPowerOfTwo` for a bad length
    /// * `InvalidSampleRate` below 8 kHz
    /// * `NonFiniteSample` if any sample is NaN or infinite
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> AnalysisResult<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyBlock);
        }
        if !samples.len().is_power_of_two() {
            return Err(AnalysisError::BlockLengthNotPowerOfTwo(samples.len()));
        }
        check_sample_rate(sample_rate)?;
        check_finite(&samples)?;
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Magnitude spectrum derived from a [`SampleBlock`] of the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumBlock {
    magnitudes: Vec<f32>,
    sample_rate: u32,
}

impl SpectrumBlock {
    /// Wraps one non-negative magnitude per frequency bin.
    pub fn new(magnitudes: Vec<f32>, sample_rate: u32) -> AnalysisResult<Self> {
        if magnitudes.is_empty() {
            return Err(AnalysisError::EmptyBlock);
        }
        check_sample_rate(sample_rate)?;
        check_finite(&magnitudes)?;
        Ok(Self {
            magnitudes,
            sample_rate,
        })
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_bins(&self) -> usize {
        self.magnitudes.len()
    }

    /// Width of one bin in Hz: `sample_rate / (2 * num_bins)`.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / (2 * self.magnitudes.len()) as f32
    }

    /// Checks that this spectrum was derived from `block`.
    pub fn check_matches(&self, block: &SampleBlock) -> AnalysisResult<()> {
        let expected = block.len() / 2;
        if self.magnitudes.len() != expected || self.sample_rate != block.sample_rate() {
            return Err(AnalysisError::SpectrumMismatch {
                expected,
                actual: self.magnitudes.len(),
            });
        }
        Ok(())
    }
}

/// A fully decoded PCM buffer, one `Vec` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> AnalysisResult<Self> {
        let Some(first) = channels.first() else {
            return Err(AnalysisError::NoChannels);
        };
        let expected = first.len();
        for (channel, data) in channels.iter().enumerate() {
            if data.len() != expected {
                return Err(AnalysisError::ChannelLengthMismatch {
                    channel,
                    expected,
                    actual: data.len(),
                });
            }
            check_finite(data)?;
        }
        check_sample_rate(sample_rate)?;
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Convenience constructor for single-channel audio.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> AnalysisResult<Self> {
        Self::new(vec![samples], sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Number of samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mixes all channels down to one by averaging.
    pub fn mono(&self) -> Vec<f32> {
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }
        let scale = 1.0 / self.channels.len() as f32;
        (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect()
    }
}
