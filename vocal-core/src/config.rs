//! # Configuration Module
//!
//! Settings the host application can change while a session runs. A new
//! configuration takes effect on the next analysis cycle.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::block::BUFFER_SIZE;
use crate::error::{AnalysisError, AnalysisResult};
use crate::voice::Gender;

/// Default noise-gate RMS below which a frame is treated as silence.
pub const DEFAULT_NOISE_GATE_RMS: f32 = 0.015;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Frames with a lower RMS are reported unvoiced.
    pub noise_gate_rms: f32,
    /// Assumed singer voice for the register classifier.
    pub gender: Gender,
    /// Samples per live frame.
    pub window_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            noise_gate_rms: DEFAULT_NOISE_GATE_RMS,
            gender: Gender::Male,
            window_size: BUFFER_SIZE,
        }
    }
}

impl AnalysisConfig {
    /// Loads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.noise_gate_rms.is_finite() || !(0.0..=1.0).contains(&self.noise_gate_rms) {
            return Err(AnalysisError::InvalidConfig(format!(
                "noise_gate_rms must be within [0, 1], got {}",
                self.noise_gate_rms
            )));
        }
        if self.window_size < 4 || !self.window_size.is_power_of_two() {
            return Err(AnalysisError::InvalidConfig(format!(
                "window_size must be a power of two, got {}",
                self.window_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{ "gender": "female" }"#).unwrap();
        assert_eq!(config.gender, Gender::Female);
        assert_eq!(config.noise_gate_rms, DEFAULT_NOISE_GATE_RMS);
        assert_eq!(config.window_size, BUFFER_SIZE);
    }

    #[test]
    fn validation() {
        assert!(AnalysisConfig::default().validate().is_ok());
        let bad_gate = AnalysisConfig {
            noise_gate_rms: -0.1,
            ..AnalysisConfig::default()
        };
        assert!(bad_gate.validate().is_err());
        let bad_window = AnalysisConfig {
            window_size: 1000,
            ..AnalysisConfig::default()
        };
        assert!(bad_window.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("vocal-core-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "noise_gate_rms": 0.02, "window_size": 4096 }"#).unwrap();
        let config = AnalysisConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.noise_gate_rms, 0.02);
        assert_eq!(config.window_size, 4096);
        assert_eq!(config.gender, Gender::Male);

        assert!(AnalysisConfig::load("/nonexistent/vocal-config.json").is_err());
    }
}
