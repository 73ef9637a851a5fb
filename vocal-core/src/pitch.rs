//! # Pitch Detection Module
//!
//! Fundamental frequency estimation for sung notes, plus the loudness and
//! brightness measures the voice classifier consumes.
//!
//! ## Features
//! - Time-domain autocorrelation with edge trimming
//! - Parabolic interpolation for sub-sample accuracy
//! - Amplitude gating to filter out silence
//! - Spectral centroid from a magnitude spectrum

use serde::{Deserialize, Serialize};

use crate::block::{SampleBlock, SpectrumBlock};

/// RMS below which autocorrelation is not reliable.
pub const SILENCE_RMS: f32 = 0.001;

/// Edge samples louder than this are trimmed before correlating.
const TRIM_THRESHOLD: f32 = 0.2;

/// A normalized-correlation peak counts as the period when it reaches this
/// fraction of the strongest candidate.
const PERIOD_PEAK_RATIO: f32 = 0.85;

/// Outcome of a pitch measurement.
///
/// `Unvoiced` is a distinct state, never encoded as a zero frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PitchEstimate {
    Voiced(f32),
    Unvoiced,
}

impl PitchEstimate {
    pub fn frequency(&self) -> Option<f32> {
        match *self {
            PitchEstimate::Voiced(freq) => Some(freq),
            PitchEstimate::Unvoiced => None,
        }
    }

    pub fn is_voiced(&self) -> bool {
        matches!(self, PitchEstimate::Voiced(_))
    }
}

/// Root mean square of a signal, 0 for an empty slice.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Estimates the fundamental frequency of a captured block.
///
/// See [`autocorrelate`] for the algorithm.
pub fn detect_pitch(block: &SampleBlock) -> PitchEstimate {
    autocorrelate(block.samples(), block.sample_rate())
}

/// Same as [`autocorrelate`], but discards results outside `[min_hz, max_hz]`.
pub fn detect_pitch_in_band(
    signal: &[f32],
    sample_rate: u32,
    min_hz: f32,
    max_hz: f32,
) -> PitchEstimate {
    match autocorrelate(signal, sample_rate) {
        PitchEstimate::Voiced(freq) if freq >= min_hz && freq <= max_hz => {
            PitchEstimate::Voiced(freq)
        }
        _ => PitchEstimate::Unvoiced,
    }
}

/// Autocorrelation pitch detection.
///
/// 1. Gate on RMS (`SILENCE_RMS`)
/// 2. Trim loud edges so the correlation starts and ends near a zero crossing
/// 3. Correlate for lags `0..=len/2`
/// 4. Walk down from the zero-lag peak to the first trough, then take the
///    strongest lag after it as the period candidate
/// 5. Prefer the first normalized-correlation peak before the candidate that
///    is nearly as strong, so a multiple of the period never wins
/// 6. Refine the period with parabolic interpolation, re-measured at
///    doubled multiples of the period while they stay strong
///
/// # Returns
/// * `Voiced(frequency)` - Detected frequency in Hz
/// * `Unvoiced` - Silence, or no periodicity found
pub fn autocorrelate(signal: &[f32], sample_rate: u32) -> PitchEstimate {
    let size = signal.len();
    if size < 4 || rms(signal) < SILENCE_RMS {
        return PitchEstimate::Unvoiced;
    }

    // --- Trim the edges ---
    let half = size / 2;
    let start = signal[..half]
        .iter()
        .position(|s| s.abs() < TRIM_THRESHOLD)
        .unwrap_or(0);
    let end = (1..half)
        .find(|&i| signal[size - i].abs() < TRIM_THRESHOLD)
        .map(|i| size - i)
        .unwrap_or(size - 1);
    if end <= start {
        return PitchEstimate::Unvoiced;
    }
    let trimmed = &signal[start..end];
    let n = trimmed.len();
    let max_lag = n / 2;
    if max_lag < 2 {
        return PitchEstimate::Unvoiced;
    }

    // --- Unnormalized autocorrelation ---
    let correlation: Vec<f32> = (0..=max_lag)
        .map(|lag| {
            trimmed[..n - lag]
                .iter()
                .zip(&trimmed[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect();
    if correlation[0] <= 0.0 {
        return PitchEstimate::Unvoiced;
    }

    // --- Skip the zero-lag peak ---
    let mut trough = 0;
    while trough + 1 < correlation.len() && correlation[trough] > correlation[trough + 1] {
        trough += 1;
    }

    let mut peak = trough;
    for lag in trough..correlation.len() {
        if correlation[lag] > correlation[peak] {
            peak = lag;
        }
    }
    if peak == 0 || correlation[peak] <= 0.0 {
        return PitchEstimate::Unvoiced;
    }

    // --- Sub-period check ---
    // When the period falls between two lags, a whole multiple of it can
    // line up better and win on raw correlation.
    let normalized = normalized_correlation(trimmed, &correlation);
    let reference = normalized[peak];
    let Some(first) = (trough + 1..=peak)
        .filter(|&lag| is_local_max(&normalized, lag))
        .map(|lag| Peak::interpolate(&normalized, lag))
        .find(|p| p.value >= PERIOD_PEAK_RATIO * reference)
    else {
        return PitchEstimate::Unvoiced;
    };

    let period = refine_over_multiples(&normalized, first.lag, reference);
    let frequency = sample_rate as f32 / period;
    if frequency.is_finite() && frequency > 0.0 {
        PitchEstimate::Voiced(frequency)
    } else {
        PitchEstimate::Unvoiced
    }
}

/// A correlation maximum located with parabolic interpolation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    lag: f32,
    value: f32,
}

impl Peak {
    /// Fits a parabola through `(-1, left)`, `(0, centre)`, `(1, right)`
    /// around `index`, which must have a neighbour on each side.
    fn interpolate(values: &[f32], index: usize) -> Self {
        let left = values[index - 1];
        let centre = values[index];
        let right = values[index + 1];
        let a = 0.5 * (left + right - 2.0 * centre);
        let b = 0.5 * (right - left);
        let offset = if a != 0.0 { -b / (2.0 * a) } else { 0.0 };
        Peak {
            lag: index as f32 + offset,
            value: a * offset * offset + b * offset + centre,
        }
    }
}

fn is_local_max(values: &[f32], index: usize) -> bool {
    index > 0
        && index + 1 < values.len()
        && values[index] > values[index - 1]
        && values[index] >= values[index + 1]
}

/// Normalized square difference function: `2 * c[lag] / m[lag]`, where
/// `m[lag]` is the energy of both overlapping segments. A pure sine reaches
/// exactly 1 at whole periods, however few samples overlap.
fn normalized_correlation(signal: &[f32], correlation: &[f32]) -> Vec<f32> {
    let n = signal.len();
    let mut energy = 2.0 * correlation[0];
    correlation
        .iter()
        .enumerate()
        .map(|(lag, &c)| {
            if lag > 0 {
                let head = signal[lag - 1];
                let tail = signal[n - lag];
                energy -= head * head + tail * tail;
            }
            if energy > 0.0 { 2.0 * c / energy } else { 0.0 }
        })
        .collect()
}

/// Re-measures `period` at 2x, 4x, 8x... its length. Interpolation error is
/// a fraction of a lag wherever it is measured, so dividing a longer lag by
/// its multiple shrinks it. Stops at the first multiple that is out of range
/// or weaker than `PERIOD_PEAK_RATIO * reference`.
fn refine_over_multiples(normalized: &[f32], period: f32, reference: f32) -> f32 {
    let mut period = period;
    let mut multiple = 1;
    loop {
        let next = multiple * 2;
        let target = (period * next as f32).round() as usize;
        if target < 2 || target + 2 >= normalized.len() {
            break;
        }
        let Some(index) = (target - 1..=target + 1)
            .filter(|&lag| is_local_max(normalized, lag))
            .max_by(|&a, &b| normalized[a].total_cmp(&normalized[b]))
        else {
            break;
        };
        let peak = Peak::interpolate(normalized, index);
        if peak.value < PERIOD_PEAK_RATIO * reference {
            break;
        }
        period = peak.lag / next as f32;
        multiple = next;
    }
    period
}

/// Magnitude-weighted mean frequency of a spectrum, a proxy for brightness.
///
/// Returns 0 for a silent spectrum.
pub fn spectral_centroid(spectrum: &SpectrumBlock) -> f32 {
    let bin_width = spectrum.bin_width();
    let (weighted, total) = spectrum
        .magnitudes()
        .iter()
        .enumerate()
        .fold((0.0f32, 0.0f32), |(weighted, total), (bin, &mag)| {
            (weighted + bin as f32 * bin_width * mag, total + mag)
        });
    if total <= 0.0 {
        return 0.0;
    }
    weighted / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn assert_within_one_percent(freq: f32, sample_rate: u32, len: usize) {
        let block = SampleBlock::new(sine(freq, sample_rate, len, 0.5), sample_rate).unwrap();
        let detected = detect_pitch(&block)
            .frequency()
            .unwrap_or_else(|| panic!("{freq} Hz was reported unvoiced"));
        let error = (detected - freq).abs() / freq;
        assert!(error < 0.01, "{freq} Hz detected as {detected} Hz");
    }

    #[test]
    fn detects_vocal_range_sines() {
        for freq in [110.0, 220.0, 440.0, 880.0, 1760.0, 2000.0] {
            assert_within_one_percent(freq, 44100, 2048);
        }
    }

    #[test]
    fn detects_low_sines_with_long_blocks() {
        for freq in [20.0, 55.0, 82.4] {
            assert_within_one_percent(freq, 8000, 4096);
        }
    }

    #[test]
    fn sweep_across_rates_and_levels_stays_within_one_percent() {
        let len = 2048;
        for sample_rate in [8000u32, 16000, 22050, 44100, 48000] {
            // Three whole periods must fit in the block.
            let mut freq = (3.0 * sample_rate as f64 / len as f64).max(20.0);
            while freq <= 2000.0 {
                for (amplitude, phase) in [(0.1, 0.0), (0.5, 2.3), (0.95, 1.1)] {
                    let samples = (0..len)
                        .map(|i| {
                            let t = i as f64 / sample_rate as f64;
                            (amplitude * (2.0 * std::f64::consts::PI * freq * t + phase).sin())
                                as f32
                        })
                        .collect();
                    let block = SampleBlock::new(samples, sample_rate).unwrap();
                    let detected = detect_pitch(&block).frequency().unwrap_or_else(|| {
                        panic!("{freq:.1} Hz at {sample_rate} Hz reported unvoiced")
                    });
                    let error = (detected as f64 - freq).abs() / freq;
                    assert!(
                        error < 0.01,
                        "{freq:.1} Hz at {sample_rate} Hz (amplitude {amplitude}) detected as {detected} Hz"
                    );
                }
                freq *= 1.053;
            }
        }
    }

    #[test]
    fn period_between_lags_is_not_reported_an_octave_low() {
        for (freq, sample_rate) in [(1032.9, 16000), (1074.9, 22050), (774.0, 8000)] {
            assert_within_one_percent(freq, sample_rate, 2048);
        }
    }

    #[test]
    fn low_voices_are_not_biased_sharp() {
        for (freq, sample_rate) in [(88.4, 44100), (96.0, 48000), (101.0, 48000)] {
            assert_within_one_percent(freq, sample_rate, 2048);
        }
    }

    #[test]
    fn interpolated_peak_leans_toward_stronger_neighbour() {
        let peak = Peak::interpolate(&[-2.0, 0.0, -1.0], 1);
        assert!((peak.lag - 1.1666666).abs() < 1e-6);
        let centred = Peak::interpolate(&[0.0, 3.0, 0.0], 1);
        assert_eq!(centred, Peak { lag: 1.0, value: 3.0 });
    }

    #[test]
    fn silence_is_unvoiced() {
        let block = SampleBlock::new(vec![0.0; 2048], 44100).unwrap();
        assert_eq!(detect_pitch(&block), PitchEstimate::Unvoiced);

        let whisper = SampleBlock::new(sine(440.0, 44100, 2048, 0.0005), 44100).unwrap();
        assert_eq!(detect_pitch(&whisper), PitchEstimate::Unvoiced);
    }

    #[test]
    fn band_limits_are_applied() {
        let signal = sine(440.0, 44100, 2048, 0.5);
        assert!(detect_pitch_in_band(&signal, 44100, 60.0, 2000.0).is_voiced());
        assert_eq!(
            detect_pitch_in_band(&signal, 44100, 60.0, 400.0),
            PitchEstimate::Unvoiced
        );
    }

    #[test]
    fn centroid_of_single_bin_is_its_frequency() {
        let mut magnitudes = vec![0.0; 1024];
        magnitudes[100] = 2.0;
        let spectrum = SpectrumBlock::new(magnitudes, 44100).unwrap();
        let expected = 100.0 * 44100.0 / 2048.0;
        assert!((spectral_centroid(&spectrum) - expected).abs() < 1e-2);
    }

    #[test]
    fn centroid_of_silence_is_zero() {
        let spectrum = SpectrumBlock::new(vec![0.0; 1024], 44100).unwrap();
        assert_eq!(spectral_centroid(&spectrum), 0.0);
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        let square: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms(&square) - 1.0).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }
}
