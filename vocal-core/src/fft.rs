//! # Fast Fourier Transform (FFT) Module
//!
//! Derives the magnitude spectrum the spectral centroid is computed from,
//! for capture layers that only deliver time-domain samples.
//!
//! ## Features
//! - FFT through RustFFT
//! - Hann windowing for reduced spectral leakage
//! - DC offset removal

use rustfft::{FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::fmt;

use crate::block::{SampleBlock, SpectrumBlock};
use crate::error::AnalysisResult;

/// Turns sample blocks into magnitude spectra, reusing FFT plans across
/// blocks of the same length.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer").finish_non_exhaustive()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Computes the [`SpectrumBlock`] of `block`: `len / 2` magnitudes at
    /// the block's sample rate.
    pub fn analyze(&mut self, block: &SampleBlock) -> AnalysisResult<SpectrumBlock> {
        let mut frame = windowed_frame(block);
        self.planner.plan_fft_forward(frame.len()).process(&mut frame);

        let magnitudes = frame[..frame.len() / 2].iter().map(|c| c.norm()).collect();
        SpectrumBlock::new(magnitudes, block.sample_rate())
    }
}

/// One-off [`SpectrumAnalyzer::analyze`] without plan reuse.
pub fn spectrum_block(block: &SampleBlock) -> AnalysisResult<SpectrumBlock> {
    SpectrumAnalyzer::new().analyze(block)
}

/// Copies the block into a complex FFT buffer with its mean removed and a
/// Hann window applied.
fn windowed_frame(block: &SampleBlock) -> Vec<Complex<f32>> {
    let samples = block.samples();
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    let span = samples.len().saturating_sub(1).max(1) as f32;

    samples
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let hann = 0.5 * (1.0 - (2.0 * PI * i as f32 / span).cos());
            Complex::new((sample - mean) * hann, 0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_peaks_in_its_bin() {
        let sample_rate = 8192;
        let n = 1024;
        // 8 Hz per bin, so 440 Hz sits in bin 55
        let samples = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let block = SampleBlock::new(samples, sample_rate).unwrap();
        let spectrum = spectrum_block(&block).unwrap();

        assert_eq!(spectrum.num_bins(), n / 2);
        assert!(spectrum.check_matches(&block).is_ok());
        let peak = spectrum
            .magnitudes()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 55);
    }

    #[test]
    fn analyzer_reuses_plans_across_lengths() {
        let mut analyzer = SpectrumAnalyzer::new();
        for n in [256, 1024, 256] {
            let block = SampleBlock::new(vec![0.1; n], 8000).unwrap();
            let spectrum = analyzer.analyze(&block).unwrap();
            assert_eq!(spectrum.num_bins(), n / 2);
            assert_eq!(spectrum.sample_rate(), 8000);
        }
    }

    #[test]
    fn dc_is_removed() {
        let block = SampleBlock::new(vec![0.5; 256], 8000).unwrap();
        let spectrum = spectrum_block(&block).unwrap();
        assert!(spectrum.magnitudes().iter().all(|m| *m < 1e-3));
    }
}
