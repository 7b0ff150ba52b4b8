use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfinder_core::{clamp_finite, Capability, CapabilityTable, EntropyWeights};

/// Lower bound of a capability's budget multiplier.
pub const MIN_BUDGET_MULTIPLIER: f64 = 0.5;
/// Upper bound of a capability's budget multiplier.
pub const MAX_BUDGET_MULTIPLIER: f64 = 3.0;

/// Reasoning-token buffer each capability scales its budget against.
/// `0` means the capability runs without a thinking budget.
pub const MAX_THINKING_BUFFER: CapabilityTable<u64> =
    CapabilityTable::new([0, 8000, 16000, 12000, 4000]);

/// Bookkeeping carried with the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsMetadata {
    /// Time of the last completed pass.
    pub last_updated: DateTime<Utc>,
    /// Completed re-optimization passes.
    pub update_count: u64,
    /// Convergence proxy in `[0, 1]`; only grows through re-optimization.
    pub confidence: f64,
}

/// The small parametric model maintained by the cortex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CortexWeights {
    /// Feature weights of the entropy estimate; sums to one.
    pub entropy_weights: EntropyWeights,
    /// Clamped to `[0.5, 3.0]`.
    pub budget_multipliers: CapabilityTable<f64>,
    /// Sampling temperature, `[0, 1]`.
    pub temperatures: CapabilityTable<f64>,
    /// Learned prior of success, `[0, 1]`.
    pub routing_preferences: CapabilityTable<f64>,
    /// Pass bookkeeping.
    pub metadata: WeightsMetadata,
}

impl Default for CortexWeights {
    fn default() -> Self {
        Self {
            entropy_weights: EntropyWeights::default(),
            budget_multipliers: CapabilityTable::from_fn(|_| 1.0),
            temperatures: CapabilityTable::new([0.3, 0.5, 0.3, 0.2, 0.9]),
            routing_preferences: CapabilityTable::new([0.9, 0.8, 0.8, 0.75, 0.7]),
            metadata: WeightsMetadata {
                last_updated: Utc::now(),
                update_count: 0,
                confidence: 0.0,
            },
        }
    }
}

impl CortexWeights {
    /// Bring every learned scalar back inside its documented range.
    pub fn sanitized(mut self) -> Self {
        let entropy = self.entropy_weights;
        if !entropy.within_ranges() || (entropy.sum() - 1.0).abs() > 1e-9 {
            self.entropy_weights = entropy.projected();
        }
        for (_, multiplier) in self.budget_multipliers.iter_mut() {
            *multiplier = clamp_finite(*multiplier, MIN_BUDGET_MULTIPLIER, MAX_BUDGET_MULTIPLIER);
        }
        for (_, temperature) in self.temperatures.iter_mut() {
            *temperature = clamp_finite(*temperature, 0.0, 1.0);
        }
        for (_, preference) in self.routing_preferences.iter_mut() {
            *preference = clamp_finite(*preference, 0.0, 1.0);
        }
        self.metadata.confidence = clamp_finite(self.metadata.confidence, 0.0, 1.0);
        self
    }

    /// Budget multiplier for `capability`.
    pub fn budget_multiplier(&self, capability: Capability) -> f64 {
        self.budget_multipliers[capability]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_in_range() {
        let weights = CortexWeights::default();
        assert_eq!(weights.clone().sanitized().budget_multipliers, weights.budget_multipliers);
        assert_eq!(weights.metadata.update_count, 0);
        assert_eq!(weights.temperatures[Capability::Creative], 0.9);
    }

    #[test]
    fn test_sanitize_clamps_everything() {
        let mut weights = CortexWeights::default();
        weights.budget_multipliers[Capability::Coding] = 9.0;
        weights.budget_multipliers[Capability::Research] = f64::NAN;
        weights.temperatures[Capability::Creative] = 1.4;
        weights.routing_preferences[Capability::Analysis] = -0.3;
        weights.metadata.confidence = 7.0;

        let weights = weights.sanitized();
        assert_eq!(weights.budget_multipliers[Capability::Coding], MAX_BUDGET_MULTIPLIER);
        assert_eq!(weights.budget_multipliers[Capability::Research], MIN_BUDGET_MULTIPLIER);
        assert_eq!(weights.temperatures[Capability::Creative], 1.0);
        assert_eq!(weights.routing_preferences[Capability::Analysis], 0.0);
        assert_eq!(weights.metadata.confidence, 1.0);
    }

    #[test]
    fn test_sanitize_leaves_valid_entropy_weights_untouched() {
        let weights = CortexWeights::default();
        let sanitized = weights.clone().sanitized();
        assert_eq!(sanitized.entropy_weights, weights.entropy_weights);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(CortexWeights::default()).unwrap();
        assert!(json["entropy_weights"]["keyword"].is_number());
        assert!(json["budget_multipliers"]["coding"].is_number());
        assert!(json["metadata"]["update_count"].is_number());
    }

    #[test]
    fn test_fast_task_has_no_thinking_buffer() {
        assert_eq!(MAX_THINKING_BUFFER[Capability::FastTask], 0);
        assert!(MAX_THINKING_BUFFER[Capability::Analysis] > 0);
    }
}
