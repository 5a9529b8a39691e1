//! Tunable constants for the task engine and the built-in tasks.
//!
//! Every section has a `Default` matching the stock game values. Overrides
//! are read from JSON; missing fields keep their defaults:
//!
//! ```
//! use colony_tasks::config::TaskConfig;
//!
//! let config = TaskConfig::from_json(r#"{ "eva": { "airlock_patience": 2 } }"#).unwrap();
//! assert_eq!(config.eva.airlock_patience, 2);
//! assert!((config.eva.airlock_cycle_time - 10.0).abs() < f64::EPSILON);
//! ```

use serde::{Deserialize, Serialize};

/// Peak solar irradiance at the Martian surface (W/m²).
pub const MAX_SOLAR_IRRADIANCE: f64 = 586.0;

/// Errors reading a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid task config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid task config: {0}")]
    Invalid(String),
}

/// All task configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub stress: StressConfig,
    pub eva: EvaConfig,
    pub compute: ComputeConfig,
    pub maintenance: MaintenanceConfig,
    pub conversation: ConversationConfig,
    pub regolith: RegolithConfig,
}

impl TaskConfig {
    /// Parse a JSON document and validate ranges.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TaskConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compute.jitter_min > self.compute.jitter_max {
            return Err(ConfigError::Invalid(format!(
                "compute jitter range is empty: {}..={}",
                self.compute.jitter_min, self.compute.jitter_max
            )));
        }
        if self.compute.jitter_min <= 0.0 {
            return Err(ConfigError::Invalid(
                "compute jitter must be positive".into(),
            ));
        }
        if self.eva.walk_speed <= 0.0 {
            return Err(ConfigError::Invalid("eva walk speed must be positive".into()));
        }
        if self.eva.airlock_cycle_time < 0.0 {
            return Err(ConfigError::Invalid(
                "airlock cycle time cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Stress applied while working.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Fraction of positive stress removed per skill level.
    pub skill_relief: f64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self { skill_relief: 0.1 }
    }
}

/// Extravehicular activity limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaConfig {
    /// Stress per millisol spent on any EVA.
    pub stress_modifier: f64,
    /// Irradiance at or below which the surface is too dark to work.
    pub min_sunlight: f64,
    /// Performance rating below which an EVA is cut short.
    pub min_performance: f64,
    /// Performance rating below which a worker outside heads straight back.
    pub super_unfit_performance: f64,
    /// Performance rating required to start an EVA.
    pub fitness_threshold: f64,
    /// Suit oxygen fraction below which an EVA is cut short.
    pub min_oxygen_fraction: f64,
    /// Millisols to cycle an airlock.
    pub airlock_cycle_time: f64,
    /// Consecutive airlock denials tolerated before giving up.
    pub airlock_patience: u32,
    /// Walking speed in meters per millisol.
    pub walk_speed: f64,
    /// Base chance per millisol of a suit accident.
    pub base_accident_chance: f64,
}

impl Default for EvaConfig {
    fn default() -> Self {
        Self {
            stress_modifier: 0.05,
            min_sunlight: MAX_SOLAR_IRRADIANCE * 0.01,
            min_performance: 0.05,
            super_unfit_performance: 0.1,
            fitness_threshold: 0.5,
            min_oxygen_fraction: 0.2,
            airlock_cycle_time: 10.0,
            airlock_patience: 5,
            walk_speed: 2.0,
            base_accident_chance: 0.01,
        }
    }
}

/// Compute-node admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Lower bound of the steady-state request jitter.
    pub jitter_min: f64,
    /// Upper bound of the steady-state request jitter.
    pub jitter_max: f64,
    /// Consecutive refusals tolerated before an analysis gives up. 0 waits
    /// until the task duration runs out.
    pub patience: u32,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            jitter_min: 0.9,
            jitter_max: 1.1,
            patience: 10,
        }
    }
}

/// Preventive maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub stress_modifier: f64,
    /// Task duration in millisols.
    pub duration: f64,
    /// Base accident chance per millisol, scaled by wear.
    pub base_accident_chance: f64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            stress_modifier: 0.1,
            duration: 50.0,
            base_accident_chance: 0.001,
        }
    }
}

/// Casual conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Negative values relieve stress.
    pub stress_modifier: f64,
    /// Minimum conversation length in millisols.
    pub base_duration: f64,
    /// Conversation attribute points per extra millisol.
    pub attribute_per_msol: f64,
    /// Whether a colonist may call someone in another settlement.
    pub allow_remote: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            stress_modifier: -0.3,
            base_duration: 1.0,
            attribute_per_msol: 20.0,
            allow_remote: true,
        }
    }
}

/// Regolith digging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegolithConfig {
    /// Kilograms collected per millisol at skill 0.
    pub base_rate: f64,
    /// Time allowed at the dig site, in millisols.
    pub site_duration: f64,
    pub stress_modifier: f64,
}

impl Default for RegolithConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.5,
            site_duration: 150.0,
            stress_modifier: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TaskConfig::default().validate().is_ok());
    }

    #[test]
    fn min_sunlight_is_one_percent_of_peak() {
        let eva = EvaConfig::default();
        assert!((eva.min_sunlight - 5.86).abs() < 1e-9);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config =
            TaskConfig::from_json(r#"{ "compute": { "jitter_min": 1.0, "jitter_max": 1.0 } }"#)
                .unwrap();
        assert!((config.compute.jitter_min - 1.0).abs() < f64::EPSILON);
        assert!((config.maintenance.duration - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.eva.airlock_patience, 5);
    }

    #[test]
    fn empty_jitter_range_rejected() {
        let err = TaskConfig::from_json(r#"{ "compute": { "jitter_min": 1.2, "jitter_max": 1.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = TaskConfig::from_json("{ eva: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
