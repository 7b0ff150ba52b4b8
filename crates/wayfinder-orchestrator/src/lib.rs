//! Capability routing: epsilon-greedy selection, multi-stage planning with
//! fallbacks, and the adaptive router that couples the engine with the
//! learning cortex.
//!
//! # Main types
//!
//! - [`OrchestrationEngine`]: Selects capabilities and learns per-route statistics.
//! - [`AdaptiveRouter`]: Engine plus cortex; plans, routes, reports and runs plans.
//! - [`AgentExecutor`]: Async seam to whatever executes a routed stage.
//! - [`ExecutionPlan`]: Ordered, dependency-linked stages for one task.
//! - [`RoutingPolicy`]: Exploration rate, utility weights and planning limits.

/// Selection counters and the bounded outcome log.
pub mod analytics;
/// The orchestration engine.
pub mod engine;
/// Execution seam for routed stages.
pub mod executor;
/// Engine configuration.
pub mod policy;
/// Role labels, prompts and fallbacks per capability.
pub mod profiles;
/// Adaptive router and plan execution.
pub mod router;
/// Shared routing types (ExecutionContext, AgentSelection, Stage, etc.).
pub mod types;

pub use analytics::AnalyticsLog;
pub use engine::{capability_match, cost_efficiency, historical_success, OrchestrationEngine};
pub use executor::{AgentExecutor, ExecutionRequest};
pub use policy::{RoutingPolicy, UtilityWeights};
pub use profiles::{default_profiles, profile, CapabilityProfile};
pub use router::{
    AdaptiveRouter, AttemptReport, PlanRunReport, RoutedPlan, RoutingDecision, StageReport,
    StageStatus,
};
pub use types::{
    AgentSelection, AnalyticsRecord, ExecutionContext, ExecutionPlan, FallbackStrategy,
    RoutePerformance, RoutingAnalytics, Stage, StageCondition,
};
