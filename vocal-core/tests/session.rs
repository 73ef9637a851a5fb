use std::f32::consts::PI;
use std::time::Duration;

use vocal_core::key::KeyEstimate;
use vocal_core::vibrato::VibratoReport;
use vocal_core::{AnalysisConfig, AnalysisError, DecodedBuffer, SampleBlock, Session, fft};

const SAMPLE_RATE: u32 = 44100;
const WINDOW: usize = 2048;

fn sine_block(freq: f32, amplitude: f32) -> SampleBlock {
    let samples = (0..WINDOW)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();
    SampleBlock::new(samples, SAMPLE_RATE).unwrap()
}

fn started_session() -> Session {
    let mut session = Session::new(AnalysisConfig::default()).unwrap();
    session.start();
    session
}

#[test]
fn voiced_frame_reports_note_and_volume() {
    let mut session = started_session();
    let result = session
        .process_samples(&sine_block(440.0, 0.5), 0.0)
        .unwrap()
        .unwrap();

    let note = result.note.unwrap();
    assert_eq!(note.label(), "A4");
    assert!((result.frequency_hz.unwrap() - 440.0).abs() < 4.4);
    assert_eq!(result.target_frequency_hz, Some(440.0));
    assert!(result.cents.unwrap().abs() <= 10);
    assert!((result.volume_rms - 0.5 / 2.0_f32.sqrt()).abs() < 0.01);
    assert!(result.voice_type.is_some());
    assert_eq!(result.estimated_key, KeyEstimate::InsufficientData);
}

#[test]
fn frames_below_noise_gate_are_unvoiced() {
    let mut session = started_session();
    let result = session
        .process_samples(&sine_block(440.0, 0.01), 0.0)
        .unwrap()
        .unwrap();
    assert_eq!(result.frequency_hz, None);
    assert_eq!(result.note, None);
    assert_eq!(result.voice_type, None);
}

#[test]
fn noise_gate_change_applies_to_next_frame() {
    let mut session = started_session();
    let quiet = sine_block(330.0, 0.01);
    assert!(session.process_samples(&quiet, 0.0).unwrap().unwrap().frequency_hz.is_none());

    session
        .set_config(AnalysisConfig {
            noise_gate_rms: 0.001,
            ..AnalysisConfig::default()
        })
        .unwrap();
    assert!(session.process_samples(&quiet, 16.0).unwrap().unwrap().frequency_hz.is_some());
}

#[test]
fn key_emerges_after_enough_frames() {
    let mut session = started_session();
    let triad = [261.63, 329.63, 392.0];
    for frame in 0..30 {
        let block = sine_block(triad[frame % 3], 0.5);
        session.process_samples(&block, frame as f64 * 16.0).unwrap();
    }
    assert_eq!(session.estimated_key().to_string(), "C Major");
}

#[test]
fn mismatched_input_fails_fast() {
    let mut session = started_session();
    let short = SampleBlock::new(vec![0.1; 1024], SAMPLE_RATE).unwrap();
    let spectrum = fft::spectrum_block(&short).unwrap();
    assert_eq!(
        session.process_frame(&short, &spectrum, 0.0),
        Err(AnalysisError::BlockLengthMismatch {
            expected: WINDOW,
            actual: 1024
        })
    );

    let block = sine_block(220.0, 0.5);
    assert_eq!(
        session.process_frame(&block, &spectrum, 0.0),
        Err(AnalysisError::SpectrumMismatch {
            expected: WINDOW / 2,
            actual: 512
        })
    );
}

#[test]
fn stopped_session_drops_frames_and_forgets_state() {
    let mut session = started_session();
    let initial_key = session.estimated_key();
    let initial_vibrato = session.vibrato();
    for frame in 0..40 {
        session
            .process_samples(&sine_block(392.0, 0.5), frame as f64 * 16.0)
            .unwrap();
    }
    assert_ne!(session.estimated_key(), initial_key);

    session.stop();
    assert!(!session.is_active());
    assert_eq!(session.process_samples(&sine_block(392.0, 0.5), 700.0), Ok(None));
    assert_eq!(session.estimated_key(), initial_key);
    assert_eq!(session.vibrato(), initial_vibrato);
    assert_eq!(initial_vibrato, VibratoReport::none());

    session.start();
    assert_eq!(session.estimated_key(), KeyEstimate::InsufficientData);
}

#[test]
fn batch_result_arrives_for_loaded_source() {
    let mut session = Session::new(AnalysisConfig::default()).unwrap();
    let samples: Vec<f32> = (0..8192 * 16)
        .map(|i| 0.5 * (2.0 * PI * 196.0 * i as f32 / 22050.0).sin())
        .collect();
    session.load_source(DecodedBuffer::from_mono(samples, 22050).unwrap());
    assert!(session.is_active());

    let result = session.wait_for_batch(Duration::from_secs(60)).unwrap();
    let range = result.pitch_range.unwrap();
    assert_eq!(range.min_note.label(), "G3");
    assert!(!result.voice_type_labels.is_empty());
}

#[test]
fn stale_batch_result_is_discarded() {
    let mut session = Session::new(AnalysisConfig::default()).unwrap();
    let buffer = DecodedBuffer::from_mono(vec![0.0; 22050], 22050).unwrap();
    session.load_source(buffer);
    session.stop();

    // The analysis of the old source still completes but must not surface.
    std::thread::sleep(Duration::from_millis(200));
    assert!(session.wait_for_batch(Duration::from_millis(500)).is_none());
    assert!(session.poll_batch().is_none());
}
