//! # Tempo Estimation Module
//!
//! BPM detection over a decoded buffer by amplitude-peak onset picking and
//! the modal inter-onset interval.

use std::collections::BTreeMap;

/// Analysis window length in seconds.
pub const WINDOW_SECONDS: f32 = 0.05;
/// Minimum windows between two onsets.
pub const REFRACTORY_WINDOWS: usize = 5;
/// Plausible song tempo band; results are folded into it.
pub const MIN_BPM: f32 = 70.0;
pub const MAX_BPM: f32 = 180.0;

/// Peak absolute amplitude of each ~50 ms window.
fn window_peaks(samples: &[f32], window_size: usize) -> Vec<f32> {
    samples
        .chunks(window_size)
        .map(|w| w.iter().fold(0.0f32, |peak, s| peak.max(s.abs())))
        .collect()
}

/// Onset threshold: the 70th-percentile peak scaled by 0.8.
fn onset_threshold(peaks: &[f32]) -> f32 {
    let mut sorted = peaks.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let index = ((sorted.len() as f32 * 0.3) as usize).min(sorted.len() - 1);
    sorted[index] * 0.8
}

/// Window indices that start a beat.
fn detect_onsets(peaks: &[f32], threshold: f32) -> Vec<usize> {
    let mut onsets: Vec<usize> = Vec::new();
    for (i, &peak) in peaks.iter().enumerate() {
        let refractory_over = onsets
            .last()
            .is_none_or(|&last| i - last >= REFRACTORY_WINDOWS);
        if peak > threshold && refractory_over {
            onsets.push(i);
        }
    }
    onsets
}

/// Doubles or halves a tempo until it lies in `[MIN_BPM, MAX_BPM]`.
pub fn fold_bpm(mut bpm: f32) -> f32 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return 0.0;
    }
    while bpm < MIN_BPM {
        bpm *= 2.0;
    }
    while bpm > MAX_BPM {
        bpm /= 2.0;
    }
    bpm
}

/// Detects the tempo of a decoded mono buffer.
///
/// # Returns
/// * BPM in `[70, 180]`, or 0 when no dominant beat interval exists
pub fn detect_bpm(samples: &[f32], sample_rate: u32) -> u32 {
    let window_size = (sample_rate as f32 * WINDOW_SECONDS) as usize;
    if window_size == 0 || samples.len() < window_size {
        return 0;
    }
    let window_seconds = window_size as f32 / sample_rate as f32;

    let peaks = window_peaks(samples, window_size);
    let threshold = onset_threshold(&peaks);
    let onsets = detect_onsets(&peaks, threshold);

    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for pair in onsets.windows(2) {
        *histogram.entry(pair[1] - pair[0]).or_insert(0) += 1;
    }
    // Ties resolve to the shortest interval.
    let mut modal: Option<(usize, usize)> = None;
    for (&interval, &count) in &histogram {
        if modal.is_none_or(|(_, best)| count > best) {
            modal = Some((interval, count));
        }
    }
    let Some((interval, _)) = modal else {
        log::debug!("No beat interval found among {} onsets", onsets.len());
        return 0;
    };

    let bpm = fold_bpm(60.0 / (interval as f32 * window_seconds));
    log::debug!(
        "Modal beat interval {} windows from {} onsets -> {:.1} BPM",
        interval,
        onsets.len(),
        bpm
    );
    bpm.round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Short decaying clicks at a fixed tempo after `lead_in` seconds of silence.
    fn click_track(bpm: f32, seconds: f32, lead_in: f32, sample_rate: u32) -> Vec<f32> {
        let total = ((seconds + lead_in) * sample_rate as f32) as usize;
        let mut samples = vec![0.0; total];
        let beat = (60.0 / bpm * sample_rate as f32) as usize;
        let mut pos = (lead_in * sample_rate as f32) as usize;
        while pos + 200 < total {
            for i in 0..200 {
                samples[pos + i] = 0.9 * (1.0 - i as f32 / 200.0);
            }
            pos += beat;
        }
        samples
    }

    #[test]
    fn click_track_at_120() {
        let samples = click_track(120.0, 10.0, 1.0, 44100);
        assert_eq!(detect_bpm(&samples, 44100), 120);
    }

    #[test]
    fn slow_track_folds_up() {
        // 60 BPM is outside the band and doubles to 120.
        let samples = click_track(60.0, 12.0, 1.0, 44100);
        assert_eq!(detect_bpm(&samples, 44100), 120);
    }

    #[test]
    fn silence_has_no_tempo() {
        assert_eq!(detect_bpm(&vec![0.0; 44100 * 3], 44100), 0);
        assert_eq!(detect_bpm(&[0.5; 100], 44100), 0);
    }

    #[test]
    fn folding() {
        assert_eq!(fold_bpm(240.0), 120.0);
        assert_eq!(fold_bpm(50.0), 100.0);
        assert_eq!(fold_bpm(400.0), 100.0);
        assert_eq!(fold_bpm(0.0), 0.0);
        assert_eq!(fold_bpm(70.0), 70.0);
        assert_eq!(fold_bpm(180.0), 180.0);
    }
}
