use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use wayfinder_core::{Capability, CapabilityTable, ExecutionOutcome};

/// Neutral prior for a capability's success rate.
pub const PRIOR_SUCCESS_RATE: f64 = 0.5;
/// Neutral prior for a capability's average token cost.
pub const PRIOR_AVG_TOKENS: f64 = 1000.0;
/// Neutral prior for a capability's average latency in milliseconds.
pub const PRIOR_AVG_LATENCY_MS: f64 = 5000.0;

/// Planning-time view of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Task prompt.
    pub prompt: String,
    /// Derived complexity in `[0, 1]`.
    pub entropy: f64,
    /// Prior turns in the conversation.
    pub history_len: usize,
    /// Whether the task carries images.
    #[serde(default)]
    pub has_visual: bool,
    /// Capabilities already planned or executed for this task.
    pub completed: Vec<Capability>,
    /// Capabilities selection may choose from.
    pub eligible: Vec<Capability>,
    /// Tokens still available; decremented as stages are planned.
    pub remaining_budget: u64,
}

impl ExecutionContext {
    /// Context with every capability eligible and no history.
    pub fn new(prompt: impl Into<String>, entropy: f64, remaining_budget: u64) -> Self {
        Self {
            prompt: prompt.into(),
            entropy: wayfinder_core::clamp_finite(entropy, 0.0, 1.0),
            history_len: 0,
            has_visual: false,
            completed: Vec::new(),
            eligible: Capability::ALL.to_vec(),
            remaining_budget,
        }
    }

    /// Restrict selection to `eligible`.
    pub fn with_eligible(mut self, eligible: Vec<Capability>) -> Self {
        self.eligible = eligible;
        self
    }

    /// Set the conversation history depth.
    pub fn with_history(mut self, history_len: usize) -> Self {
        self.history_len = history_len;
        self
    }

    /// Mark the task as carrying images.
    pub fn with_visual(mut self, has_visual: bool) -> Self {
        self.has_visual = has_visual;
        self
    }
}

/// A routing choice for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSelection {
    /// Selection id, reused as task id by the cortex.
    pub id: Uuid,
    /// Chosen capability.
    pub capability: Capability,
    /// Role label of the capability profile.
    pub role: String,
    /// Success rate of the chosen capability, or 0.5 for exploration picks.
    pub confidence: f64,
    /// Expected token use from route statistics.
    pub estimated_tokens: u64,
    /// Why the capability was chosen.
    pub justification: String,
    /// Whether the pick came from the exploration branch.
    pub exploration: bool,
}

/// Learned statistics for one capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePerformance {
    /// EMA of success.
    pub success_rate: f64,
    /// EMA of tokens used.
    pub avg_tokens: f64,
    /// EMA of latency.
    pub avg_latency_ms: f64,
    /// Outcomes applied so far.
    pub sample_count: u64,
    /// Time of the last applied outcome.
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for RoutePerformance {
    fn default() -> Self {
        Self {
            success_rate: PRIOR_SUCCESS_RATE,
            avg_tokens: PRIOR_AVG_TOKENS,
            avg_latency_ms: PRIOR_AVG_LATENCY_MS,
            sample_count: 0,
            last_updated: None,
        }
    }
}

impl RoutePerformance {
    /// Fold one outcome into the moving averages with learning rate `alpha`.
    pub fn apply(&mut self, outcome: &ExecutionOutcome, alpha: f64) {
        self.success_rate = ema(self.success_rate, outcome.success_value(), alpha).clamp(0.0, 1.0);
        self.avg_tokens = ema(self.avg_tokens, outcome.tokens_used as f64, alpha).max(0.0);
        self.avg_latency_ms = ema(self.avg_latency_ms, outcome.latency_ms as f64, alpha).max(0.0);
        self.sample_count = self.sample_count.saturating_add(1);
        self.last_updated = Some(Utc::now());
    }
}

fn ema(current: f64, sample: f64, alpha: f64) -> f64 {
    current * (1.0 - alpha) + sample * alpha
}

/// When a stage may run. Always true today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCondition {
    /// Run unconditionally.
    #[default]
    Always,
}

impl StageCondition {
    /// Whether the stage may run given the completed stages.
    pub fn evaluate(&self, _completed: &[Uuid]) -> bool {
        match self {
            StageCondition::Always => true,
        }
    }
}

/// Capability to retry with when a stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackStrategy {
    /// Capability retried when the stage fails.
    pub capability: Capability,
    /// Retries before the stage is marked failed.
    pub max_retries: u32,
}

/// One planned unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage id.
    pub id: Uuid,
    /// Capability chosen for the stage.
    pub selection: AgentSelection,
    /// Stages that must complete first.
    pub dependencies: Vec<Uuid>,
    /// Extra gate checked after dependencies.
    pub condition: StageCondition,
    /// Estimated tokens of this stage and every stage before it.
    pub cumulative_cost: u64,
    /// Retry strategy on failure.
    pub fallback: FallbackStrategy,
}

impl Stage {
    /// Create an unconditional stage.
    pub fn new(
        selection: AgentSelection,
        dependencies: Vec<Uuid>,
        cumulative_cost: u64,
        fallback: FallbackStrategy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            selection,
            dependencies,
            condition: StageCondition::Always,
            cumulative_cost,
            fallback,
        }
    }

    /// Whether every dependency has completed and the condition holds.
    pub fn is_ready(&self, completed_ids: &[Uuid]) -> bool {
        self.dependencies
            .iter()
            .all(|dep| completed_ids.contains(dep))
            && self.condition.evaluate(completed_ids)
    }
}

/// Ordered, dependency-linked stages for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Plan id.
    pub id: Uuid,
    /// Entropy the plan was built for.
    pub entropy: f64,
    /// Token budget the plan was sized against.
    pub budget: u64,
    /// Stages in execution order.
    pub stages: Vec<Stage>,
    /// Cumulative cost of the final stage.
    pub estimated_cost: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    /// Build a plan; the estimated cost is the last stage's cumulative cost.
    pub fn new(entropy: f64, budget: u64, stages: Vec<Stage>) -> Self {
        let estimated_cost = stages.last().map_or(0, |s| s.cumulative_cost);
        Self {
            id: Uuid::new_v4(),
            entropy,
            budget,
            stages,
            estimated_cost,
            created_at: Utc::now(),
        }
    }

    /// Whether the plan has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Detect dependency cycles using DFS.
    pub fn has_cycle(&self) -> bool {
        let index: HashMap<Uuid, &Stage> = self.stages.iter().map(|s| (s.id, s)).collect();
        let mut visited: HashMap<Uuid, u8> = HashMap::new();
        self.stages
            .iter()
            .any(|s| Self::dfs_cycle(&index, s.id, &mut visited))
    }

    fn dfs_cycle(index: &HashMap<Uuid, &Stage>, id: Uuid, visited: &mut HashMap<Uuid, u8>) -> bool {
        match visited.get(&id) {
            Some(1) => return true,  // back edge = cycle
            Some(2) => return false, // already processed
            _ => {}
        }
        visited.insert(id, 1);
        if let Some(stage) = index.get(&id) {
            for dep in &stage.dependencies {
                if Self::dfs_cycle(index, *dep, visited) {
                    return true;
                }
            }
        }
        visited.insert(id, 2);
        false
    }
}

/// One applied outcome, kept for analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    /// Selection the outcome belongs to.
    pub selection_id: Uuid,
    /// Capability that ran.
    pub capability: Capability,
    /// Whether the selection was exploratory.
    pub exploration: bool,
    /// Whether the call succeeded.
    pub success: bool,
    /// Tokens used.
    pub tokens_used: u64,
    /// Latency.
    pub latency_ms: u64,
    /// Observed quality.
    pub quality: f64,
    /// When the outcome was applied.
    pub recorded_at: DateTime<Utc>,
}

impl AnalyticsRecord {
    /// Record an outcome against its selection.
    pub fn new(selection: &AgentSelection, outcome: &ExecutionOutcome) -> Self {
        Self {
            selection_id: selection.id,
            capability: selection.capability,
            exploration: selection.exploration,
            success: outcome.success,
            tokens_used: outcome.tokens_used,
            latency_ms: outcome.latency_ms,
            quality: outcome.quality,
            recorded_at: Utc::now(),
        }
    }
}

/// Read-only routing summary for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingAnalytics {
    /// Per-capability statistics.
    pub routes: CapabilityTable<RoutePerformance>,
    /// Exploration picks over all picks; 0 before the first pick.
    pub exploration_rate: f64,
    /// Selections made so far.
    pub total_selections: u64,
    /// Outcomes applied so far.
    pub total_executions: u64,
    /// Sample-weighted mean success rate; 0.5 before any sample.
    pub aggregate_utility: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(capability: Capability) -> AgentSelection {
        AgentSelection {
            id: Uuid::new_v4(),
            capability,
            role: "Test".into(),
            confidence: 0.5,
            estimated_tokens: 1000,
            justification: "test".into(),
            exploration: false,
        }
    }

    fn fallback() -> FallbackStrategy {
        FallbackStrategy {
            capability: Capability::Analysis,
            max_retries: 2,
        }
    }

    #[test]
    fn test_route_performance_priors() {
        let perf = RoutePerformance::default();
        assert_eq!(perf.success_rate, 0.5);
        assert_eq!(perf.avg_tokens, 1000.0);
        assert_eq!(perf.avg_latency_ms, 5000.0);
        assert_eq!(perf.sample_count, 0);
        assert!(perf.last_updated.is_none());
    }

    #[test]
    fn test_route_performance_ema() {
        let mut perf = RoutePerformance::default();
        perf.apply(&ExecutionOutcome::new(true, 2000, 1000, 0.9), 0.2);
        assert!((perf.success_rate - 0.6).abs() < 1e-12);
        assert!((perf.avg_tokens - 1200.0).abs() < 1e-9);
        assert!((perf.avg_latency_ms - 4200.0).abs() < 1e-9);
        assert_eq!(perf.sample_count, 1);
        assert!(perf.last_updated.is_some());
    }

    #[test]
    fn test_context_defaults() {
        let ctx = ExecutionContext::new("hello", 1.7, 500);
        assert_eq!(ctx.entropy, 1.0);
        assert_eq!(ctx.eligible.len(), Capability::COUNT);
        assert!(ctx.completed.is_empty());
    }

    #[test]
    fn test_stage_ready_with_deps() {
        let first = Stage::new(selection(Capability::Research), vec![], 1000, fallback());
        let second = Stage::new(selection(Capability::Analysis), vec![first.id], 2000, fallback());
        assert!(first.is_ready(&[]));
        assert!(!second.is_ready(&[]));
        assert!(second.is_ready(&[first.id]));
    }

    #[test]
    fn test_plan_cost_comes_from_last_stage() {
        let first = Stage::new(selection(Capability::Research), vec![], 1000, fallback());
        let second = Stage::new(selection(Capability::Analysis), vec![first.id], 2000, fallback());
        let plan = ExecutionPlan::new(0.5, 10_000, vec![first, second]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.estimated_cost, 2000);
        assert!(!plan.has_cycle());

        let empty = ExecutionPlan::new(0.5, 10_000, Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.estimated_cost, 0);
    }

    #[test]
    fn test_cycle_detection() {
        let mut a = Stage::new(selection(Capability::Research), vec![], 0, fallback());
        let mut b = Stage::new(selection(Capability::Coding), vec![], 0, fallback());
        a.dependencies = vec![b.id];
        b.dependencies = vec![a.id];
        let plan = ExecutionPlan::new(0.5, 1000, vec![a, b]);
        assert!(plan.has_cycle());
    }

    #[test]
    fn test_condition_always() {
        assert!(StageCondition::Always.evaluate(&[]));
        assert_eq!(StageCondition::default(), StageCondition::Always);
    }
}
