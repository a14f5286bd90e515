//! Confidence calibration: mapping raw cosine scores onto the coarse
//! decision levels reported to callers.

use serde::{Deserialize, Serialize};

/// Decision thresholds for the calibrated score. The raw-to-calibrated
/// mapping is piecewise linear through `(medium, 0.5)` and `(high, 0.8)`,
/// monotonic, and clamped to `[0, 1]`. With calibration disabled the mapping
/// is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub enabled: bool,
    /// Raw score at and above which confidence is `High`. Default 0.8.
    pub high: f32,
    /// Raw score at and above which confidence is `Medium`. Default 0.6.
    pub medium: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            high: 0.8,
            medium: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

/// A raw score together with its calibrated form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedScore {
    pub raw_score: f32,
    pub calibrated_score: f32,
    pub confidence_level: ConfidenceLevel,
    pub uncertainty: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceCalibrator {
    config: CalibrationConfig,
}

impl ConfidenceCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn calibrate(&self, raw: f32) -> CalibratedScore {
        let raw_clamped = raw.clamp(0.0, 1.0);
        let calibrated = if self.config.enabled {
            self.map(raw_clamped)
        } else {
            raw_clamped
        };
        let confidence_level = if raw_clamped >= self.config.high {
            ConfidenceLevel::High
        } else if raw_clamped >= self.config.medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };
        CalibratedScore {
            raw_score: raw,
            calibrated_score: calibrated,
            confidence_level,
            uncertainty: (1.0 - calibrated).clamp(0.0, 1.0),
        }
    }

    fn map(&self, raw: f32) -> f32 {
        let CalibrationConfig { medium, high, .. } = self.config;
        if raw < medium {
            // [0, medium) -> [0, 0.5)
            0.5 * raw / medium.max(f32::EPSILON)
        } else if raw < high {
            // [medium, high) -> [0.5, 0.8)
            0.5 + 0.3 * (raw - medium) / (high - medium).max(f32::EPSILON)
        } else {
            // [high, 1] -> [0.8, 1]
            0.8 + 0.2 * (raw - high) / (1.0 - high).max(f32::EPSILON)
        }
        .clamp(0.0, 1.0)
    }
}
