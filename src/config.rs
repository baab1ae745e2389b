//! Session configuration surface.
//!
//! Every option is hot-updatable mid-session through [`ConfigPatch`].
//! Validation is all-or-nothing: a malformed value fails the whole patch
//! and nothing is applied.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

fn default_overcrowding_threshold() -> u32 {
    10
}

fn default_loitering_distance() -> f64 {
    50.0
}

fn default_loitering_time() -> f64 {
    300.0
}

fn default_fps() -> u32 {
    30
}

fn default_velocity_threshold() -> f64 {
    15.0
}

/// Full configuration for one analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum allowed people count before overcrowding.
    #[serde(default = "default_overcrowding_threshold")]
    pub overcrowding_threshold: u32,

    /// Maximum movement radius (pixels) still considered stationary.
    #[serde(default = "default_loitering_distance")]
    pub loitering_distance: f64,

    /// Dwell time (seconds) before a stationary track is loitering.
    #[serde(default = "default_loitering_time")]
    pub loitering_time: f64,

    /// Frames per second of the analyzed stream.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Joint-velocity threshold (pixels/frame) for suspicious activity.
    #[serde(default = "default_velocity_threshold")]
    pub velocity_threshold: f64,

    /// Restricted zones as ordered vertex lists; round-trips losslessly.
    #[serde(default)]
    pub restricted_zones: Vec<Vec<[f64; 2]>>,

    /// Frames between suspicious-activity evaluations. `None` selects the
    /// session-mode default (10 for batch, 5 for live).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_check_interval: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            overcrowding_threshold: default_overcrowding_threshold(),
            loitering_distance: default_loitering_distance(),
            loitering_time: default_loitering_time(),
            fps: default_fps(),
            velocity_threshold: default_velocity_threshold(),
            restricted_zones: Vec::new(),
            activity_check_interval: None,
        }
    }
}

impl AnalysisConfig {
    /// Range-check every field. Zone vertex counts are deliberately not
    /// checked here: a degenerate zone is skipped with a warning at add
    /// time instead of rejecting the whole configuration.
    pub fn validate(&self) -> Result<()> {
        if self.overcrowding_threshold == 0 {
            return Err(Error::InvalidConfig(
                "overcrowding_threshold must be at least 1".to_string(),
            ));
        }
        validate_positive("loitering_distance", self.loitering_distance)?;
        validate_positive("loitering_time", self.loitering_time)?;
        if self.fps == 0 {
            return Err(Error::InvalidConfig("fps must be at least 1".to_string()));
        }
        validate_positive("velocity_threshold", self.velocity_threshold)?;
        if self.activity_check_interval == Some(0) {
            return Err(Error::InvalidConfig(
                "activity_check_interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a validated patch, returning the merged configuration.
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        Self {
            overcrowding_threshold: patch
                .overcrowding_threshold
                .unwrap_or(self.overcrowding_threshold),
            loitering_distance: patch.loitering_distance.unwrap_or(self.loitering_distance),
            loitering_time: patch.loitering_time.unwrap_or(self.loitering_time),
            fps: patch.fps.unwrap_or(self.fps),
            velocity_threshold: patch.velocity_threshold.unwrap_or(self.velocity_threshold),
            restricted_zones: patch
                .restricted_zones
                .clone()
                .unwrap_or_else(|| self.restricted_zones.clone()),
            activity_check_interval: patch
                .activity_check_interval
                .or(self.activity_check_interval),
        }
    }
}

fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidConfig(format!(
            "{} must be a positive finite number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Partial configuration update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub overcrowding_threshold: Option<u32>,
    pub loitering_distance: Option<f64>,
    pub loitering_time: Option<f64>,
    pub fps: Option<u32>,
    pub velocity_threshold: Option<f64>,
    pub restricted_zones: Option<Vec<Vec<[f64; 2]>>>,
    pub activity_check_interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overcrowding_threshold, 10);
        assert_eq!(config.fps, 30);
    }

    #[test]
    fn test_deserialize_with_partial_fields() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"overcrowding_threshold": 5}"#).unwrap();
        assert_eq!(config.overcrowding_threshold, 5);
        assert_eq!(config.loitering_distance, 50.0);
        assert!(config.restricted_zones.is_empty());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut config = AnalysisConfig::default();
        config.loitering_distance = -1.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.velocity_threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.fps = 0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.activity_check_interval = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wrong_type_fails_deserialization() {
        let result: std::result::Result<AnalysisConfig, _> =
            serde_json::from_str(r#"{"fps": "thirty"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_merging() {
        let base = AnalysisConfig::default();
        let patch = ConfigPatch {
            overcrowding_threshold: Some(3),
            loitering_time: Some(60.0),
            ..ConfigPatch::default()
        };

        let merged = base.merged(&patch);
        assert_eq!(merged.overcrowding_threshold, 3);
        assert_eq!(merged.loitering_time, 60.0);
        // Untouched fields keep their values
        assert_eq!(merged.loitering_distance, 50.0);
        assert_eq!(merged.fps, 30);
    }

    #[test]
    fn test_zone_config_round_trip() {
        let mut config = AnalysisConfig::default();
        config.restricted_zones = vec![
            vec![[100.0, 100.0], [200.0, 100.0], [200.0, 200.0], [100.0, 200.0]],
            vec![[0.5, 0.25], [10.75, 0.25], [5.0, 9.125]],
        ];

        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.restricted_zones, config.restricted_zones);
    }
}
