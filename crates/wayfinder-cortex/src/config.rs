use serde::{Deserialize, Serialize};
use wayfinder_core::{WayfinderError, WayfinderResult};

/// Tuning knobs for the learning cortex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CortexConfig {
    /// Maximum experiences held before the oldest is evicted.
    #[serde(default = "default_max_buffer")]
    pub max_buffer: usize,
    /// Buffer size that triggers a re-optimization pass.
    #[serde(default = "default_update_frequency")]
    pub update_frequency: usize,
    /// Passes over fewer experiences than this are skipped.
    #[serde(default = "default_min_batch")]
    pub min_batch: usize,
    /// Step size of the entropy weight update.
    #[serde(default = "default_entropy_learning_rate")]
    pub entropy_learning_rate: f64,
    /// Mean success below this grows a capability's budget multiplier.
    #[serde(default = "default_underperform_threshold")]
    pub underperform_threshold: f64,
    /// Multiplier growth factor for underperforming capabilities.
    #[serde(default = "default_budget_increase")]
    pub budget_increase: f64,
    /// Mean quality above this (with efficient token use) shrinks the multiplier.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    /// Minimum quality per token for the shrink rule.
    #[serde(default = "default_efficiency_threshold")]
    pub efficiency_threshold: f64,
    /// Multiplier shrink factor for efficient capabilities.
    #[serde(default = "default_budget_decrease")]
    pub budget_decrease: f64,
    /// Weight of the observed success rate when smoothing routing preferences.
    #[serde(default = "default_preference_smoothing")]
    pub preference_smoothing: f64,
    /// Confidence gained per completed pass.
    #[serde(default = "default_confidence_step")]
    pub confidence_step: f64,
}

fn default_max_buffer() -> usize {
    1000
}
fn default_update_frequency() -> usize {
    100
}
fn default_min_batch() -> usize {
    10
}
fn default_entropy_learning_rate() -> f64 {
    0.05
}
fn default_underperform_threshold() -> f64 {
    0.7
}
fn default_budget_increase() -> f64 {
    1.1
}
fn default_quality_threshold() -> f64 {
    0.85
}
fn default_efficiency_threshold() -> f64 {
    1e-4
}
fn default_budget_decrease() -> f64 {
    0.95
}
fn default_preference_smoothing() -> f64 {
    0.2
}
fn default_confidence_step() -> f64 {
    0.1
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            max_buffer: default_max_buffer(),
            update_frequency: default_update_frequency(),
            min_batch: default_min_batch(),
            entropy_learning_rate: default_entropy_learning_rate(),
            underperform_threshold: default_underperform_threshold(),
            budget_increase: default_budget_increase(),
            quality_threshold: default_quality_threshold(),
            efficiency_threshold: default_efficiency_threshold(),
            budget_decrease: default_budget_decrease(),
            preference_smoothing: default_preference_smoothing(),
            confidence_step: default_confidence_step(),
        }
    }
}

impl CortexConfig {
    /// Reject settings that would break the buffer or weight invariants.
    pub fn validate(&self) -> WayfinderResult<()> {
        if self.max_buffer == 0 {
            return Err(WayfinderError::Config(
                "cortex.max_buffer must be at least 1".into(),
            ));
        }
        if self.update_frequency == 0 {
            return Err(WayfinderError::Config(
                "cortex.update_frequency must be at least 1".into(),
            ));
        }
        // the buffer never grows past max_buffer, so larger values would never trigger a pass
        if self.update_frequency > self.max_buffer {
            return Err(WayfinderError::Config(format!(
                "cortex.update_frequency ({}) must not exceed cortex.max_buffer ({})",
                self.update_frequency, self.max_buffer
            )));
        }
        if self.min_batch > self.max_buffer {
            return Err(WayfinderError::Config(format!(
                "cortex.min_batch ({}) must not exceed cortex.max_buffer ({})",
                self.min_batch, self.max_buffer
            )));
        }
        let unit_fields = [
            ("entropy_learning_rate", self.entropy_learning_rate),
            ("underperform_threshold", self.underperform_threshold),
            ("quality_threshold", self.quality_threshold),
            ("preference_smoothing", self.preference_smoothing),
            ("confidence_step", self.confidence_step),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(WayfinderError::Config(format!(
                    "cortex.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !(self.budget_increase >= 1.0 && self.budget_increase.is_finite()) {
            return Err(WayfinderError::Config(format!(
                "cortex.budget_increase must be >= 1, got {}",
                self.budget_increase
            )));
        }
        if !(self.budget_decrease > 0.0 && self.budget_decrease <= 1.0) {
            return Err(WayfinderError::Config(format!(
                "cortex.budget_decrease must be within (0, 1], got {}",
                self.budget_decrease
            )));
        }
        if !(self.efficiency_threshold >= 0.0) {
            return Err(WayfinderError::Config(
                "cortex.efficiency_threshold must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(CortexConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CortexConfig = serde_json::from_str(r#"{"update_frequency": 50}"#).unwrap();
        assert_eq!(config.update_frequency, 50);
        assert_eq!(config.max_buffer, 1000);
        assert_eq!(config.preference_smoothing, 0.2);
    }

    #[test]
    fn test_rejects_zero_frequency() {
        let config = CortexConfig {
            update_frequency: 0,
            ..CortexConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_frequency_above_buffer_cap() {
        let config = CortexConfig {
            update_frequency: 1001,
            ..CortexConfig::default()
        };
        assert!(matches!(config.validate(), Err(WayfinderError::Config(_))));

        let at_cap = CortexConfig {
            update_frequency: 1000,
            ..CortexConfig::default()
        };
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn test_rejects_min_batch_above_buffer_cap() {
        let config = CortexConfig {
            max_buffer: 50,
            update_frequency: 50,
            min_batch: 51,
            ..CortexConfig::default()
        };
        assert!(matches!(config.validate(), Err(WayfinderError::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_rate() {
        let config = CortexConfig {
            entropy_learning_rate: 1.5,
            ..CortexConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
