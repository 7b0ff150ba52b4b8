use crate::engine::OrchestrationEngine;
use crate::executor::{AgentExecutor, ExecutionRequest};
use crate::profiles::profile;
use crate::types::{AgentSelection, ExecutionContext, ExecutionPlan, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;
use wayfinder_core::{Capability, ExecutionOutcome, WayfinderResult};
use wayfinder_cortex::{LearningCortex, OptimizationReport, Prediction, TaskRecord};

/// A selection together with the cortex's predictions for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The engine's pick.
    pub selection: AgentSelection,
    /// Entropy the decision was made at.
    pub entropy: f64,
    /// Thinking budget predicted by the cortex.
    pub predicted_budget: u64,
    /// Success probability predicted by the cortex.
    pub predicted_success: f64,
    /// Sampling temperature predicted by the cortex.
    pub temperature: f64,
}

impl RoutingDecision {
    /// Predictions in the shape the cortex records.
    pub fn prediction(&self) -> Prediction {
        Prediction {
            budget: self.predicted_budget,
            success: self.predicted_success,
        }
    }

    /// Describe the routed task for the cortex; the selection id doubles as task id.
    pub fn task_record(&self, prompt_len: usize, has_visual: bool, history_len: usize) -> TaskRecord {
        TaskRecord {
            task_id: self.selection.id,
            capability: self.selection.capability,
            entropy: self.entropy,
            prompt_len,
            has_visual,
            history_len,
        }
    }
}

/// A plan plus one routing decision per stage, in stage order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedPlan {
    /// Task prompt.
    pub prompt: String,
    /// Whether the task carries images.
    pub has_visual: bool,
    /// The planned stages.
    pub plan: ExecutionPlan,
    /// One decision per stage, in stage order.
    pub decisions: Vec<RoutingDecision>,
}

impl RoutedPlan {
    /// Prompt length in chars, the unit the complexity scorer measures.
    pub fn prompt_len(&self) -> usize {
        self.prompt.chars().count()
    }

    /// Routing decision for the stage with `stage_id`.
    pub fn decision_for(&self, stage_id: Uuid) -> Option<&RoutingDecision> {
        self.plan
            .stages
            .iter()
            .position(|s| s.id == stage_id)
            .and_then(|i| self.decisions.get(i))
    }
}

/// Outcome of one plan stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// An attempt succeeded.
    Completed,
    /// Every attempt failed.
    Failed,
    /// Not attempted because a dependency did not complete.
    Skipped,
}

/// One executor call for a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptReport {
    /// Zero for the planned attempt, then one per retry.
    pub attempt: u32,
    /// Selection the attempt ran under.
    pub selection_id: Uuid,
    /// Capability that ran.
    pub capability: Capability,
    /// Observed outcome; failures from executor errors carry zero tokens.
    pub outcome: ExecutionOutcome,
    /// Executor error message, when the call itself failed.
    pub error: Option<String>,
}

/// Attempts and final status of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage this report covers.
    pub stage_id: Uuid,
    /// Capability the plan chose.
    pub planned: Capability,
    /// Final status.
    pub status: StageStatus,
    /// Every executor call, in order.
    pub attempts: Vec<AttemptReport>,
}

/// Result of running a routed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRunReport {
    /// Plan that ran.
    pub plan_id: Uuid,
    /// One report per stage, in plan order.
    pub stages: Vec<StageReport>,
    /// Tokens used across all attempts.
    pub tokens_used: u64,
    /// Re-optimization passes triggered by this run's outcomes.
    pub reoptimizations: usize,
}

impl PlanRunReport {
    fn count(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|s| s.status == status).count()
    }

    /// Stages that completed.
    pub fn completed(&self) -> usize {
        self.count(StageStatus::Completed)
    }

    /// Stages whose attempts all failed.
    pub fn failed(&self) -> usize {
        self.count(StageStatus::Failed)
    }

    /// Stages skipped because a dependency did not complete.
    pub fn skipped(&self) -> usize {
        self.count(StageStatus::Skipped)
    }

    /// Whether every stage completed.
    pub fn is_success(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::Completed)
    }
}

/// Pairs the orchestration engine with a learning cortex.
///
/// The engine decides which capability runs each stage; the cortex sizes the
/// thinking budget and temperature, and both learn from every reported outcome.
pub struct AdaptiveRouter {
    engine: OrchestrationEngine,
    cortex: Arc<LearningCortex>,
}

impl AdaptiveRouter {
    /// Couple an engine with a shared cortex.
    pub fn new(engine: OrchestrationEngine, cortex: Arc<LearningCortex>) -> Self {
        Self { engine, cortex }
    }

    /// The selection engine.
    pub fn engine(&self) -> &OrchestrationEngine {
        &self.engine
    }

    /// The shared learning cortex.
    pub fn cortex(&self) -> &Arc<LearningCortex> {
        &self.cortex
    }

    /// Build a planning context, scoring entropy with the cortex's learned weights.
    pub fn context(&self, prompt: &str, history_len: usize, has_visual: bool, budget: u64) -> ExecutionContext {
        let entropy = self.cortex.estimate_entropy(prompt, history_len, has_visual);
        ExecutionContext::new(prompt, entropy, budget)
            .with_history(history_len)
            .with_visual(has_visual)
    }

    /// Select the next capability and attach predictions.
    pub fn route(&self, ctx: &ExecutionContext) -> WayfinderResult<RoutingDecision> {
        let selection = self.engine.select_next_agent(ctx)?;
        Ok(self.decide(selection, ctx.entropy, ctx.has_visual))
    }

    /// Estimate entropy for `prompt` and build a routed plan.
    pub fn plan(&self, prompt: &str, max_agents: usize, budget: u64, has_visual: bool) -> RoutedPlan {
        self.plan_for_context(self.context(prompt, 0, has_visual, budget), max_agents)
    }

    /// Plan for a caller-built context, e.g. one with a narrowed eligible set.
    pub fn plan_for_context(&self, ctx: ExecutionContext, max_agents: usize) -> RoutedPlan {
        let prompt = ctx.prompt.clone();
        let (entropy, has_visual) = (ctx.entropy, ctx.has_visual);
        let plan = self.engine.plan_for_context(ctx, max_agents);
        let decisions = plan
            .stages
            .iter()
            .map(|s| self.decide(s.selection.clone(), entropy, has_visual))
            .collect();
        RoutedPlan {
            prompt,
            has_visual,
            plan,
            decisions,
        }
    }

    /// Apply an outcome to the engine and, unless it is a duplicate, to the cortex.
    ///
    /// Returns the report of a re-optimization pass when the outcome triggered one.
    pub fn report(
        &self,
        decision: &RoutingDecision,
        task: &TaskRecord,
        outcome: &ExecutionOutcome,
    ) -> Option<OptimizationReport> {
        if !self.engine.update_from_execution(&decision.selection, outcome) {
            return None;
        }
        let experience = self
            .cortex
            .create_experience(task, decision.prediction(), outcome);
        self.cortex.record_experience(experience)
    }

    /// Execute a routed plan stage by stage.
    ///
    /// A failed stage is retried with its fallback capability up to the
    /// stage's retry cap. Stages whose dependencies did not complete are
    /// skipped. Every attempt is reported back to the engine and the cortex.
    pub async fn run_plan(&self, routed: &RoutedPlan, executor: &dyn AgentExecutor) -> PlanRunReport {
        let plan = &routed.plan;
        info!(plan_id = %plan.id, stages = plan.len(), "Router: running plan");

        let mut completed: Vec<Uuid> = Vec::new();
        let mut report = PlanRunReport {
            plan_id: plan.id,
            stages: Vec::with_capacity(plan.len()),
            tokens_used: 0,
            reoptimizations: 0,
        };

        for (index, (stage, decision)) in plan.stages.iter().zip(&routed.decisions).enumerate() {
            if !stage.is_ready(&completed) {
                warn!(stage_id = %stage.id, "Router: stage skipped, dependency did not complete");
                report.stages.push(StageReport {
                    stage_id: stage.id,
                    planned: stage.selection.capability,
                    status: StageStatus::Skipped,
                    attempts: Vec::new(),
                });
                continue;
            }

            let stage_report = self
                .run_stage(routed, stage, decision.clone(), index, executor, &mut report)
                .await;
            if stage_report.status == StageStatus::Completed {
                completed.push(stage.id);
            }
            report.stages.push(stage_report);
        }

        info!(
            plan_id = %plan.id,
            completed = report.completed(),
            failed = report.failed(),
            skipped = report.skipped(),
            tokens_used = report.tokens_used,
            "Router: plan finished"
        );
        report
    }

    async fn run_stage(
        &self,
        routed: &RoutedPlan,
        stage: &Stage,
        mut decision: RoutingDecision,
        index: usize,
        executor: &dyn AgentExecutor,
        run: &mut PlanRunReport,
    ) -> StageReport {
        let mut attempts = Vec::new();
        let mut status = StageStatus::Failed;

        for attempt in 0..=stage.fallback.max_retries {
            if attempt > 0 {
                let reason = format!(
                    "retry {attempt} after {} failed",
                    decision.selection.capability
                );
                let selection = self
                    .engine
                    .fallback_selection(stage.fallback.capability, &reason);
                decision = self.decide(selection, decision.entropy, routed.has_visual);
            }

            let request = ExecutionRequest {
                stage_id: stage.id,
                selection_id: decision.selection.id,
                attempt,
                capability: decision.selection.capability,
                role: decision.selection.role.clone(),
                system_prompt: profile(decision.selection.capability).system_prompt.to_string(),
                prompt: routed.prompt.clone(),
                thinking_budget: decision.predicted_budget,
                temperature: decision.temperature,
            };

            let started = Instant::now();
            let (outcome, error) = match executor.execute(&request).await {
                Ok(outcome) => (outcome, None),
                Err(e) => {
                    let elapsed = started.elapsed().as_millis() as u64;
                    (ExecutionOutcome::failure(0, elapsed), Some(e.to_string()))
                }
            };

            let task = decision.task_record(routed.prompt_len(), routed.has_visual, index);
            if self.report(&decision, &task, &outcome).is_some() {
                run.reoptimizations += 1;
            }
            run.tokens_used = run.tokens_used.saturating_add(outcome.tokens_used);

            let success = outcome.success;
            attempts.push(AttemptReport {
                attempt,
                selection_id: decision.selection.id,
                capability: decision.selection.capability,
                outcome,
                error,
            });

            if success {
                status = StageStatus::Completed;
                break;
            }
            warn!(
                stage_id = %stage.id,
                capability = %decision.selection.capability,
                attempt,
                "Router: stage attempt failed"
            );
        }

        StageReport {
            stage_id: stage.id,
            planned: stage.selection.capability,
            status,
            attempts,
        }
    }

    fn decide(&self, selection: AgentSelection, entropy: f64, has_visual: bool) -> RoutingDecision {
        let capability = selection.capability;
        RoutingDecision {
            predicted_budget: self.cortex.predict_budget(entropy, capability, has_visual),
            predicted_success: self.cortex.predict_success(entropy, capability),
            temperature: self.cortex.temperature(capability),
            entropy,
            selection,
        }
    }
}
