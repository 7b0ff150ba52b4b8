use crate::analytics::AnalyticsLog;
use crate::policy::RoutingPolicy;
use crate::profiles::profile;
use crate::types::{
    AgentSelection, AnalyticsRecord, ExecutionContext, ExecutionPlan, RoutePerformance,
    RoutingAnalytics, Stage,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wayfinder_core::{
    Capability, CapabilityTable, ComplexityScorer, EntropyWeights, ExecutionOutcome,
    LexicalScorer, WayfinderError, WayfinderResult,
};

/// Utility reported for names that do not map to a capability.
pub const NEUTRAL_UTILITY: f64 = 0.5;
/// Confidence attached to exploration picks.
pub const EXPLORATION_CONFIDENCE: f64 = 0.5;

struct EngineState {
    routes: CapabilityTable<RoutePerformance>,
    analytics: AnalyticsLog,
    rng: StdRng,
}

/// Chooses a capability for each stage of a task and learns from outcomes.
///
/// Selection is epsilon-greedy over a composite utility of learned success,
/// fit to the prompt's entropy and cost. All mutable state (route statistics,
/// analytics and the RNG) sits behind one mutex.
pub struct OrchestrationEngine {
    policy: RoutingPolicy,
    scorer: Arc<dyn ComplexityScorer>,
    entropy_weights: EntropyWeights,
    state: Mutex<EngineState>,
}

impl OrchestrationEngine {
    /// Create an engine with a validated policy.
    pub fn new(policy: RoutingPolicy) -> WayfinderResult<Self> {
        policy.validate()?;
        let rng = match policy.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self::build(policy, rng))
    }

    fn build(policy: RoutingPolicy, rng: StdRng) -> Self {
        let analytics = AnalyticsLog::new(policy.analytics_capacity);
        Self {
            policy,
            scorer: Arc::new(LexicalScorer::new()),
            entropy_weights: EntropyWeights::default(),
            state: Mutex::new(EngineState {
                routes: CapabilityTable::default(),
                analytics,
                rng,
            }),
        }
    }

    /// Reseed the random source.
    pub fn with_seed(self, seed: u64) -> Self {
        self.state.lock().rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Replace the complexity scorer used by [`plan_execution`](Self::plan_execution).
    pub fn with_scorer(mut self, scorer: Arc<dyn ComplexityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Use learned entropy weights, projected back into their valid ranges.
    pub fn with_entropy_weights(mut self, weights: EntropyWeights) -> Self {
        self.entropy_weights = weights.projected();
        self
    }

    /// Overwrite the learned statistics of one capability, e.g. to warm-start
    /// from a previous run.
    pub fn restore_route(&self, capability: Capability, performance: RoutePerformance) {
        self.state.lock().routes[capability] = performance;
    }

    /// Policy the engine was built with.
    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Learned statistics for `capability`.
    pub fn route(&self, capability: Capability) -> RoutePerformance {
        self.state.lock().routes[capability]
    }

    /// Pick the capability for the next stage.
    ///
    /// Only capabilities whose average token cost fits the remaining budget
    /// are considered. Fails with [`WayfinderError::NoEligibleCapability`]
    /// when none do.
    pub fn select_next_agent(&self, ctx: &ExecutionContext) -> WayfinderResult<AgentSelection> {
        let mut state = self.state.lock();
        let budget = ctx.remaining_budget as f64;
        let candidates: Vec<Capability> = ctx
            .eligible
            .iter()
            .copied()
            .filter(|c| state.routes[*c].avg_tokens <= budget)
            .collect();

        if candidates.is_empty() {
            return Err(WayfinderError::NoEligibleCapability {
                remaining_budget: ctx.remaining_budget,
            });
        }

        let explore = state.rng.gen::<f64>() < self.policy.exploration_rate;
        let (capability, confidence, justification) = if explore {
            let capability = *candidates
                .choose(&mut state.rng)
                .unwrap_or(&candidates[0]);
            (
                capability,
                EXPLORATION_CONFIDENCE,
                format!(
                    "Exploration: randomly selected {capability} among {} eligible capabilities",
                    candidates.len()
                ),
            )
        } else {
            let mut best = candidates[0];
            let mut best_utility = f64::NEG_INFINITY;
            for capability in &candidates {
                let utility = self.utility(&state.routes[*capability], *capability, ctx.entropy);
                // strict comparison keeps the first candidate on ties
                if utility > best_utility {
                    best = *capability;
                    best_utility = utility;
                }
            }
            let perf = &state.routes[best];
            (
                best,
                perf.success_rate,
                format!(
                    "Exploitation: {best} has the highest utility {best_utility:.3} \
                     (success {:.2}, match {:.2}, cost efficiency {:.2})",
                    historical_success(perf, self.policy.confidence_samples),
                    capability_match(best, ctx.entropy),
                    cost_efficiency(perf.avg_tokens),
                ),
            )
        };

        state.analytics.record_selection(explore);
        let selection = AgentSelection {
            id: Uuid::new_v4(),
            capability,
            role: profile(capability).role.to_string(),
            confidence,
            estimated_tokens: estimated_tokens(&state.routes[capability]),
            justification,
            exploration: explore,
        };
        debug!(
            capability = %selection.capability,
            exploration = explore,
            candidates = candidates.len(),
            estimated_tokens = selection.estimated_tokens,
            "Engine: agent selected"
        );
        Ok(selection)
    }

    /// Selection bound to a fixed capability, used for fallback retries.
    ///
    /// Not counted towards selection analytics.
    pub fn fallback_selection(&self, capability: Capability, reason: &str) -> AgentSelection {
        let perf = self.state.lock().routes[capability];
        AgentSelection {
            id: Uuid::new_v4(),
            capability,
            role: profile(capability).role.to_string(),
            confidence: perf.success_rate,
            estimated_tokens: estimated_tokens(&perf),
            justification: format!("Fallback: {reason}"),
            exploration: false,
        }
    }

    /// Fold an outcome into the selected capability's statistics.
    ///
    /// Returns `false` without changing anything when an outcome for the same
    /// selection is still in the analytics log.
    pub fn update_from_execution(&self, selection: &AgentSelection, outcome: &ExecutionOutcome) -> bool {
        let mut state = self.state.lock();
        if state.analytics.contains(selection.id) {
            warn!(selection_id = %selection.id, "Engine: duplicate outcome ignored");
            return false;
        }

        let route = &mut state.routes[selection.capability];
        route.apply(outcome, self.policy.learning_rate);
        debug!(
            capability = %selection.capability,
            success = outcome.success,
            success_rate = route.success_rate,
            avg_tokens = route.avg_tokens,
            samples = route.sample_count,
            "Engine: route statistics updated"
        );

        state
            .analytics
            .record_execution(AnalyticsRecord::new(selection, outcome));
        true
    }

    /// Build a plan for a raw prompt, scoring its entropy first.
    pub fn plan_execution(&self, prompt: &str, max_agents: usize, budget: u64) -> ExecutionPlan {
        let features = self.scorer.features(prompt, 0, false);
        let entropy = self.entropy_weights.estimate(&features);
        self.plan_for_context(ExecutionContext::new(prompt, entropy, budget), max_agents)
    }

    /// Build a sequential plan for a caller-built context.
    ///
    /// Stops when the projected cost reaches the policy's share of the budget,
    /// when `max_agents` stages exist, after one stage for low-entropy tasks,
    /// or when no capability fits what is left of the budget.
    pub fn plan_for_context(&self, mut ctx: ExecutionContext, max_agents: usize) -> ExecutionPlan {
        let budget = ctx.remaining_budget;
        let stop_at = budget as f64 * self.policy.budget_stop_ratio;
        let mut stages: Vec<Stage> = Vec::new();
        let mut cumulative: u64 = 0;

        while stages.len() < max_agents {
            if cumulative as f64 >= stop_at {
                debug!(cumulative, budget, "Engine: budget threshold reached");
                break;
            }
            if ctx.entropy < self.policy.low_entropy_cutoff && !stages.is_empty() {
                break;
            }

            let selection = match self.select_next_agent(&ctx) {
                Ok(selection) => selection,
                Err(e) => {
                    warn!(error = %e, stages = stages.len(), "Engine: plan terminated early");
                    break;
                }
            };

            cumulative = cumulative.saturating_add(selection.estimated_tokens);
            ctx.remaining_budget = budget.saturating_sub(cumulative);
            ctx.completed.push(selection.capability);
            ctx.history_len += 1;

            let dependencies = stages.last().map(|s| vec![s.id]).unwrap_or_default();
            let fallback = profile(selection.capability).fallback_strategy(self.policy.max_retries);
            stages.push(Stage::new(selection, dependencies, cumulative, fallback));
        }

        let plan = ExecutionPlan::new(ctx.entropy, budget, stages);
        info!(
            plan_id = %plan.id,
            stages = plan.len(),
            entropy = plan.entropy,
            estimated_cost = plan.estimated_cost,
            budget,
            "Engine: plan built"
        );
        plan
    }

    /// Per-route statistics plus selection counters and aggregate utility.
    pub fn routing_analytics(&self) -> RoutingAnalytics {
        let state = self.state.lock();
        state.analytics.summarize(&state.routes)
    }

    /// Current utility of a capability addressed by name at `entropy`.
    ///
    /// Unknown names yield [`NEUTRAL_UTILITY`].
    pub fn utility_for(&self, name: &str, entropy: f64) -> f64 {
        let Ok(capability) = name.parse::<Capability>() else {
            return NEUTRAL_UTILITY;
        };
        let perf = self.state.lock().routes[capability];
        self.utility(&perf, capability, wayfinder_core::clamp_finite(entropy, 0.0, 1.0))
    }

    fn utility(&self, perf: &RoutePerformance, capability: Capability, entropy: f64) -> f64 {
        let w = &self.policy.utility_weights;
        w.success * historical_success(perf, self.policy.confidence_samples)
            + w.capability_match * capability_match(capability, entropy)
            + w.cost_efficiency * cost_efficiency(perf.avg_tokens)
    }
}

impl Default for OrchestrationEngine {
    fn default() -> Self {
        Self::build(RoutingPolicy::default(), StdRng::from_entropy())
    }
}

/// Success rate shrunk towards 0.5 until enough samples accumulate.
pub fn historical_success(perf: &RoutePerformance, confidence_samples: u64) -> f64 {
    let c = (perf.sample_count as f64 / confidence_samples.max(1) as f64).min(1.0);
    c * perf.success_rate + (1.0 - c) * 0.5
}

/// How well a capability suits a task of the given entropy.
pub fn capability_match(capability: Capability, entropy: f64) -> f64 {
    if entropy > 0.7 {
        match capability {
            Capability::Analysis | Capability::Coding => 1.0,
            _ => 0.3,
        }
    } else if entropy >= 0.4 {
        match capability {
            Capability::Research => 0.9,
            Capability::Analysis => 0.7,
            _ => 0.5,
        }
    } else {
        match capability {
            Capability::FastTask => 1.0,
            _ => 0.6,
        }
    }
}

/// Cheaper routes score closer to 1.
pub fn cost_efficiency(avg_tokens: f64) -> f64 {
    1.0 / (1.0 + avg_tokens.max(0.0) / 1000.0)
}

fn estimated_tokens(perf: &RoutePerformance) -> u64 {
    perf.avg_tokens.max(0.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greedy() -> OrchestrationEngine {
        OrchestrationEngine::new(RoutingPolicy {
            exploration_rate: 0.0,
            seed: Some(1),
            ..RoutingPolicy::default()
        })
        .unwrap()
    }

    fn trained(success_rate: f64, sample_count: u64) -> RoutePerformance {
        RoutePerformance {
            success_rate,
            sample_count,
            ..RoutePerformance::default()
        }
    }

    #[test]
    fn test_capability_match_bands() {
        assert_eq!(capability_match(Capability::Coding, 0.8), 1.0);
        assert_eq!(capability_match(Capability::Research, 0.8), 0.3);
        assert_eq!(capability_match(Capability::Research, 0.7), 0.9);
        assert_eq!(capability_match(Capability::Analysis, 0.4), 0.7);
        assert_eq!(capability_match(Capability::Creative, 0.5), 0.5);
        assert_eq!(capability_match(Capability::FastTask, 0.1), 1.0);
        assert_eq!(capability_match(Capability::Coding, 0.39), 0.6);
    }

    #[test]
    fn test_historical_success_shrinks_towards_prior() {
        assert_eq!(historical_success(&trained(1.0, 0), 20), 0.5);
        assert!((historical_success(&trained(1.0, 10), 20) - 0.75).abs() < 1e-12);
        assert_eq!(historical_success(&trained(0.9, 50), 20), 0.9);
    }

    #[test]
    fn test_cost_efficiency() {
        assert_eq!(cost_efficiency(0.0), 1.0);
        assert_eq!(cost_efficiency(1000.0), 0.5);
    }

    #[test]
    fn test_exploit_prefers_trained_analysis_at_high_entropy() {
        let engine = greedy();
        engine.restore_route(Capability::Analysis, trained(0.9, 50));
        let ctx = ExecutionContext::new("design a distributed cache", 0.8, 10_000);

        let selection = engine.select_next_agent(&ctx).unwrap();
        assert_eq!(selection.capability, Capability::Analysis);
        assert!(!selection.exploration);
        assert_eq!(selection.confidence, 0.9);
        assert!(selection.justification.starts_with("Exploitation"));
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        // Analysis and Coding share match 1.0 and identical priors at high entropy
        let engine = greedy();
        let ctx = ExecutionContext::new("x", 0.9, 10_000)
            .with_eligible(vec![Capability::Coding, Capability::Analysis]);
        let selection = engine.select_next_agent(&ctx).unwrap();
        assert_eq!(selection.capability, Capability::Coding);
    }

    #[test]
    fn test_full_exploration() {
        let engine = OrchestrationEngine::new(RoutingPolicy {
            exploration_rate: 1.0,
            seed: Some(42),
            ..RoutingPolicy::default()
        })
        .unwrap();
        let ctx = ExecutionContext::new("x", 0.5, 10_000);
        for _ in 0..20 {
            let selection = engine.select_next_agent(&ctx).unwrap();
            assert!(selection.exploration);
            assert_eq!(selection.confidence, EXPLORATION_CONFIDENCE);
            assert!(selection.justification.starts_with("Exploration"));
        }
        assert_eq!(engine.routing_analytics().exploration_rate, 1.0);
    }

    #[test]
    fn test_budget_filter() {
        let engine = greedy();
        engine.restore_route(
            Capability::Coding,
            RoutePerformance {
                avg_tokens: 200.0,
                ..RoutePerformance::default()
            },
        );
        // only Coding fits in 500 tokens
        let ctx = ExecutionContext::new("x", 0.1, 500);
        assert_eq!(engine.select_next_agent(&ctx).unwrap().capability, Capability::Coding);

        let ctx = ExecutionContext::new("x", 0.1, 100);
        let err = engine.select_next_agent(&ctx).unwrap_err();
        assert!(matches!(
            err,
            WayfinderError::NoEligibleCapability { remaining_budget: 100 }
        ));
    }

    #[test]
    fn test_update_is_applied_once() {
        let engine = greedy();
        let ctx = ExecutionContext::new("x", 0.5, 10_000);
        let selection = engine.select_next_agent(&ctx).unwrap();
        let outcome = ExecutionOutcome::new(true, 600, 900, 0.9);

        assert!(engine.update_from_execution(&selection, &outcome));
        assert!(!engine.update_from_execution(&selection, &outcome));

        let perf = engine.route(selection.capability);
        assert_eq!(perf.sample_count, 1);
        assert!((perf.success_rate - 0.6).abs() < 1e-12);
        assert_eq!(engine.routing_analytics().total_executions, 1);
    }

    #[test]
    fn test_low_entropy_plan_has_one_stage() {
        let engine = greedy();
        let ctx = ExecutionContext::new("hi", 0.1, 100_000);
        let plan = engine.plan_for_context(ctx, 5);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.stages[0].selection.capability, Capability::FastTask);
    }

    #[test]
    fn test_plan_chains_stages_and_attaches_fallbacks() {
        let engine = greedy();
        let plan = engine.plan_for_context(ExecutionContext::new("x", 0.8, 100_000), 4);
        assert_eq!(plan.len(), 4);
        assert!(plan.stages[0].dependencies.is_empty());
        for pair in plan.stages.windows(2) {
            assert_eq!(pair[1].dependencies, vec![pair[0].id]);
            assert!(pair[1].cumulative_cost >= pair[0].cumulative_cost);
        }
        for stage in &plan.stages {
            assert_eq!(stage.fallback, profile(stage.selection.capability).fallback_strategy(2));
        }
        assert!(!plan.has_cycle());
    }

    #[test]
    fn test_plan_stops_at_budget_ratio() {
        let engine = greedy();
        // every stage costs the 1000-token prior, so a third stage no longer fits
        let plan = engine.plan_for_context(ExecutionContext::new("x", 0.8, 2500), 10);
        assert!(plan.len() <= 3);
        assert!(plan.estimated_cost as f64 <= 2500.0 * 0.9 + 1000.0);
    }

    #[test]
    fn test_zero_agents_gives_empty_plan() {
        let engine = greedy();
        let plan = engine.plan_execution("anything", 0, 10_000);
        assert!(plan.is_empty());
        assert_eq!(plan.estimated_cost, 0);
    }

    #[test]
    fn test_utility_for_unknown_name_is_neutral() {
        let engine = greedy();
        assert_eq!(engine.utility_for("telepathy", 0.5), NEUTRAL_UTILITY);
        // prior: 0.4*0.5 + 0.4*0.9 + 0.2*0.5
        assert!((engine.utility_for("research", 0.5) - 0.66).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_selection_not_counted() {
        let engine = greedy();
        let selection = engine.fallback_selection(Capability::Analysis, "coding failed");
        assert_eq!(selection.capability, Capability::Analysis);
        assert!(selection.justification.starts_with("Fallback"));
        assert_eq!(engine.routing_analytics().total_selections, 0);
    }
}
