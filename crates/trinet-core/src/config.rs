//! Detector settings, overridable from `TRINET_*` environment variables or a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const DEFAULT_MIN_FACE_SIZE: u32 = 40;
const DEFAULT_PYRAMID_FACTOR: f32 = 0.709;
const DEFAULT_SCORE_THRESHOLDS: [f32; 3] = [0.6, 0.7, 0.7];
const DEFAULT_NMS_THRESHOLDS: [f32; 3] = [0.5, 0.7, 0.7];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

/// Cascade configuration.
///
/// Index 0/1/2 of each threshold array belongs to the proposal, refine and
/// output stage respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Smallest face side, in pixels, the pyramid is built to find.
    pub min_face_size: u32,
    /// Ratio between successive pyramid scales.
    pub pyramid_factor: f32,
    /// Per-stage foreground score a candidate must exceed to survive.
    pub score_thresholds: [f32; 3],
    /// Per-stage suppression overlap cutoff.
    pub nms_thresholds: [f32; 3],
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            pyramid_factor: DEFAULT_PYRAMID_FACTOR,
            score_thresholds: DEFAULT_SCORE_THRESHOLDS,
            nms_thresholds: DEFAULT_NMS_THRESHOLDS,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from `TRINET_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_face_size: env_u32("TRINET_MIN_FACE_SIZE", defaults.min_face_size),
            pyramid_factor: env_f32("TRINET_PYRAMID_FACTOR", defaults.pyramid_factor),
            score_thresholds: env_triple("TRINET_SCORE_THRESHOLDS", defaults.score_thresholds),
            nms_thresholds: env_triple("TRINET_NMS_THRESHOLDS", defaults.nms_thresholds),
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_face_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "min_face_size",
                value: "0".into(),
            });
        }
        // A factor >= 1 never shrinks the pyramid below the detection window.
        if !(self.pyramid_factor > 0.0 && self.pyramid_factor < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "pyramid_factor",
                value: self.pyramid_factor.to_string(),
            });
        }
        for (field, values) in [
            ("score_thresholds", &self.score_thresholds),
            ("nms_thresholds", &self.nms_thresholds),
        ] {
            if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: bad.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated list of exactly three floats, e.g. `0.6,0.7,0.7`.
fn env_triple(key: &str, default: [f32; 3]) -> [f32; 3] {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_triple(&v))
        .unwrap_or(default)
}

fn parse_triple(value: &str) -> Option<[f32; 3]> {
    let parsed: Vec<f32> = value
        .split(',')
        .map(|s| s.trim().parse().ok())
        .collect::<Option<_>>()?;
    parsed.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DetectorConfig::default();
        assert_eq!(config.min_face_size, 40);
        assert!((config.pyramid_factor - 0.709).abs() < 1e-6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_override() {
        let config = DetectorConfig::from_toml_str(
            "min_face_size = 20\nscore_thresholds = [0.5, 0.6, 0.8]\n",
        )
        .unwrap();
        assert_eq!(config.min_face_size, 20);
        assert_eq!(config.score_thresholds, [0.5, 0.6, 0.8]);
        assert_eq!(config.nms_thresholds, DEFAULT_NMS_THRESHOLDS);
    }

    #[test]
    fn test_toml_rejects_bad_factor() {
        let err = DetectorConfig::from_toml_str("pyramid_factor = 1.2").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "pyramid_factor", .. }));
    }

    #[test]
    fn test_toml_rejects_zero_min_face() {
        let err = DetectorConfig::from_toml_str("min_face_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "min_face_size", .. }));
    }

    #[test]
    fn test_toml_syntax_error() {
        let err = DetectorConfig::from_toml_str("min_face_size = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_parse_triple() {
        assert_eq!(parse_triple("0.1, 0.2,0.3"), Some([0.1, 0.2, 0.3]));
        assert_eq!(parse_triple("0.1,0.2"), None);
        assert_eq!(parse_triple("0.1,x,0.3"), None);
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        let config = DetectorConfig {
            nms_thresholds: [0.5, f32::NAN, 0.7],
            ..DetectorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "nms_thresholds", .. })
        ));
    }
}
