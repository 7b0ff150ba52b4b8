use serde::{Deserialize, Serialize};
use wayfinder_core::{WayfinderError, WayfinderResult};

/// Relative weights of the three utility terms used when exploiting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilityWeights {
    /// Weight of historical success.
    #[serde(default = "default_success_weight")]
    pub success: f64,
    /// Weight of the entropy/capability fit.
    #[serde(default = "default_match_weight")]
    pub capability_match: f64,
    /// Weight of token cost.
    #[serde(default = "default_cost_weight")]
    pub cost_efficiency: f64,
}

impl Default for UtilityWeights {
    fn default() -> Self {
        Self {
            success: default_success_weight(),
            capability_match: default_match_weight(),
            cost_efficiency: default_cost_weight(),
        }
    }
}

impl UtilityWeights {
    /// Sum of the three weights.
    pub fn sum(&self) -> f64 {
        self.success + self.capability_match + self.cost_efficiency
    }
}

/// Tunables of the orchestration engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    /// Probability of picking a random candidate instead of the best one.
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,
    /// Blend of the utility terms.
    #[serde(default)]
    pub utility_weights: UtilityWeights,
    /// EMA learning rate applied to route statistics.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Samples needed before the learned success rate is fully trusted.
    #[serde(default = "default_confidence_samples")]
    pub confidence_samples: u64,
    /// Planning stops once projected cost reaches this share of the budget.
    #[serde(default = "default_budget_stop_ratio")]
    pub budget_stop_ratio: f64,
    /// Below this entropy a single stage is enough.
    #[serde(default = "default_low_entropy_cutoff")]
    pub low_entropy_cutoff: f64,
    /// Fallback retries per failed stage.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Outcomes kept for analytics and duplicate detection.
    #[serde(default = "default_analytics_capacity")]
    pub analytics_capacity: usize,
    /// Fixed RNG seed; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            exploration_rate: default_exploration_rate(),
            utility_weights: UtilityWeights::default(),
            learning_rate: default_learning_rate(),
            confidence_samples: default_confidence_samples(),
            budget_stop_ratio: default_budget_stop_ratio(),
            low_entropy_cutoff: default_low_entropy_cutoff(),
            max_retries: default_max_retries(),
            analytics_capacity: default_analytics_capacity(),
            seed: None,
        }
    }
}

impl RoutingPolicy {
    /// Reject rates outside their ranges, utility weights that do not sum to 1,
    /// and zero `confidence_samples` or `analytics_capacity`.
    pub fn validate(&self) -> WayfinderResult<()> {
        unit_interval("exploration_rate", self.exploration_rate)?;
        unit_interval("budget_stop_ratio", self.budget_stop_ratio)?;
        unit_interval("low_entropy_cutoff", self.low_entropy_cutoff)?;
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(WayfinderError::Config(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        let w = &self.utility_weights;
        for (name, value) in [
            ("utility_weights.success", w.success),
            ("utility_weights.capability_match", w.capability_match),
            ("utility_weights.cost_efficiency", w.cost_efficiency),
        ] {
            unit_interval(name, value)?;
        }
        if (w.sum() - 1.0).abs() > 1e-6 {
            return Err(WayfinderError::Config(format!(
                "utility_weights must sum to 1, got {}",
                w.sum()
            )));
        }
        if self.confidence_samples == 0 {
            return Err(WayfinderError::Config(
                "confidence_samples must be at least 1".into(),
            ));
        }
        if self.analytics_capacity == 0 {
            return Err(WayfinderError::Config(
                "analytics_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn unit_interval(name: &str, value: f64) -> WayfinderResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(WayfinderError::Config(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

fn default_exploration_rate() -> f64 {
    0.1
}
fn default_success_weight() -> f64 {
    0.4
}
fn default_match_weight() -> f64 {
    0.4
}
fn default_cost_weight() -> f64 {
    0.2
}
fn default_learning_rate() -> f64 {
    0.2
}
fn default_confidence_samples() -> u64 {
    20
}
fn default_budget_stop_ratio() -> f64 {
    0.9
}
fn default_low_entropy_cutoff() -> f64 {
    0.3
}
fn default_max_retries() -> u32 {
    2
}
fn default_analytics_capacity() -> usize {
    1000
}
