//! Batch re-optimization of [`CortexWeights`] from buffered experiences.
//!
//! A pass runs three independent steps over the same batch:
//!
//! 1. gradient step on the entropy feature weights, projected back onto the
//!    constrained simplex;
//! 2. multiplicative budget multiplier adjustment per capability;
//! 3. exponential smoothing of routing preferences toward observed success.

use crate::config::CortexConfig;
use crate::experience::Experience;
use crate::weights::{CortexWeights, MAX_BUDGET_MULTIPLIER, MIN_BUDGET_MULTIPLIER};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use wayfinder_core::{clamp_finite, Capability, CapabilityTable, ComplexityScorer, EntropyWeights};

/// Which budget rule fired for a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetRule {
    /// Mean success was below the threshold; the budget grew.
    Underperforming,
    /// Quality was high and token use efficient; the budget shrank.
    Efficient,
    /// Neither rule applied.
    Unchanged,
}

/// Budget multiplier change for one capability seen in the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAdjustment {
    /// Capability whose multiplier moved.
    pub capability: Capability,
    /// Multiplier before the pass.
    pub before: f64,
    /// Multiplier after the pass.
    pub after: f64,
    /// Rule that applied.
    pub rule: BudgetRule,
}

/// Summary of a completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Experiences consumed by the pass.
    pub batch_size: usize,
    /// Entropy weights after the pass.
    pub entropy_weights: EntropyWeights,
    /// Per-capability multiplier changes.
    pub budget_adjustments: Vec<BudgetAdjustment>,
    /// Routing preferences after smoothing.
    pub routing_preferences: CapabilityTable<f64>,
    /// Pass count including this one.
    pub update_count: u64,
    /// Confidence after the pass.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct CapabilityStats {
    count: usize,
    successes: f64,
    quality: f64,
    tokens: f64,
}

impl CapabilityStats {
    fn success_rate(&self) -> f64 {
        self.successes / self.count.max(1) as f64
    }

    fn mean_quality(&self) -> f64 {
        self.quality / self.count.max(1) as f64
    }

    fn mean_tokens(&self) -> f64 {
        self.tokens / self.count.max(1) as f64
    }
}

fn group_by_capability(batch: &[Experience]) -> CapabilityTable<CapabilityStats> {
    let mut stats = CapabilityTable::<CapabilityStats>::default();
    for exp in batch {
        let entry = &mut stats[exp.capability];
        entry.count += 1;
        entry.successes += exp.success_value();
        entry.quality += clamp_finite(exp.actual_quality, 0.0, 1.0);
        entry.tokens += exp.actual_budget as f64;
    }
    stats
}

/// Run one pass over `batch`, mutating `weights` in place.
///
/// Returns `None` without touching anything when the batch is smaller than
/// `config.min_batch`.
pub fn reoptimize(
    weights: &mut CortexWeights,
    batch: &[Experience],
    scorer: &dyn ComplexityScorer,
    config: &CortexConfig,
) -> Option<OptimizationReport> {
    if batch.is_empty() || batch.len() < config.min_batch {
        return None;
    }

    weights.entropy_weights =
        updated_entropy_weights(&weights.entropy_weights, batch, scorer, config);

    let stats = group_by_capability(batch);
    let budget_adjustments = update_budget_multipliers(weights, &stats, config);
    update_routing_preferences(weights, &stats, config);

    weights.metadata.update_count += 1;
    weights.metadata.last_updated = Utc::now();
    weights.metadata.confidence =
        clamp_finite(weights.metadata.confidence + config.confidence_step, 0.0, 1.0);

    Some(OptimizationReport {
        batch_size: batch.len(),
        entropy_weights: weights.entropy_weights,
        budget_adjustments,
        routing_preferences: weights.routing_preferences,
        update_count: weights.metadata.update_count,
        confidence: weights.metadata.confidence,
    })
}

fn updated_entropy_weights(
    current: &EntropyWeights,
    batch: &[Experience],
    scorer: &dyn ComplexityScorer,
    config: &CortexConfig,
) -> EntropyWeights {
    let mut gradient = [0.0_f64; 4];
    for exp in batch {
        let features = scorer.recorded_features(exp.prompt_len, exp.history_len, exp.has_visual);
        let error = exp.success_value() - current.estimate(&features);
        for (g, f) in gradient.iter_mut().zip(features.as_array()) {
            *g += error * f;
        }
    }

    let n = batch.len().max(1) as f64;
    let lr = config.entropy_learning_rate;
    EntropyWeights {
        length: current.length + lr * gradient[0] / n,
        keyword: current.keyword + lr * gradient[1] / n,
        history: current.history + lr * gradient[2] / n,
        visual: current.visual + lr * gradient[3] / n,
    }
    .projected()
}

fn update_budget_multipliers(
    weights: &mut CortexWeights,
    stats: &CapabilityTable<CapabilityStats>,
    config: &CortexConfig,
) -> Vec<BudgetAdjustment> {
    let mut adjustments = Vec::new();
    for (capability, group) in stats.iter() {
        if group.count == 0 {
            continue;
        }
        let before = weights.budget_multipliers[capability];
        let efficiency = group.mean_quality() / group.mean_tokens().max(1.0);

        let (factor, rule) = if group.success_rate() < config.underperform_threshold {
            (config.budget_increase, BudgetRule::Underperforming)
        } else if group.mean_quality() > config.quality_threshold
            && efficiency > config.efficiency_threshold
        {
            (config.budget_decrease, BudgetRule::Efficient)
        } else {
            (1.0, BudgetRule::Unchanged)
        };

        let after = clamp_finite(before * factor, MIN_BUDGET_MULTIPLIER, MAX_BUDGET_MULTIPLIER);
        weights.budget_multipliers[capability] = after;
        adjustments.push(BudgetAdjustment {
            capability,
            before,
            after,
            rule,
        });
    }
    adjustments
}

fn update_routing_preferences(
    weights: &mut CortexWeights,
    stats: &CapabilityTable<CapabilityStats>,
    config: &CortexConfig,
) {
    let alpha = config.preference_smoothing;
    for (capability, group) in stats.iter() {
        if group.count == 0 {
            continue;
        }
        let current = weights.routing_preferences[capability];
        let smoothed = current * (1.0 - alpha) + group.success_rate() * alpha;
        weights.routing_preferences[capability] = clamp_finite(smoothed, 0.0, 1.0);
    }
}
