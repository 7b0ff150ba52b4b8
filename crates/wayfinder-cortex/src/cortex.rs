use crate::config::CortexConfig;
use crate::experience::{Experience, ExperienceBuffer, Prediction, TaskRecord};
use crate::optimizer::{reoptimize, OptimizationReport};
use crate::weights::{CortexWeights, MAX_THINKING_BUFFER};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use wayfinder_core::{
    clamp_finite, Capability, ComplexityScorer, ExecutionOutcome, LexicalScorer, WayfinderResult,
};

/// Budget every capability with a thinking buffer starts from.
pub const BASE_BUDGET: u64 = 100;
/// Hard ceiling on any predicted budget.
pub const MAX_BUDGET: u64 = 32_000;
/// Budget factor applied when the task carries visual input.
pub const VISUAL_BUDGET_FACTOR: f64 = 1.5;
/// Success predictions never drop below this floor.
pub const MIN_PREDICTED_SUCCESS: f64 = 0.1;
/// How strongly entropy lowers the predicted success.
pub const ENTROPY_SUCCESS_PENALTY: f64 = 0.2;

/// Read-only learning summary for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CortexMetrics {
    /// Experiences waiting for the next pass.
    pub buffered_experiences: usize,
    /// Mean `|predicted_success - actual|` over the buffer.
    pub average_prediction_error: f64,
    /// Fraction of buffered experiences that succeeded.
    pub success_rate: f64,
    /// Mean observed quality over the buffer.
    pub average_quality: f64,
    /// Weight confidence, used as a convergence proxy.
    pub convergence: f64,
    /// Completed re-optimization passes.
    pub update_count: u64,
}

struct CortexState {
    weights: CortexWeights,
    buffer: ExperienceBuffer,
}

/// Online learner that sizes budgets and estimates success per capability.
///
/// All state sits behind one mutex: experience appends and re-optimization
/// passes are serialized, and a pass always runs against the drained buffer.
pub struct LearningCortex {
    config: CortexConfig,
    scorer: Arc<dyn ComplexityScorer>,
    state: Mutex<CortexState>,
}

impl LearningCortex {
    /// Create a cortex with default configuration and weights.
    pub fn new() -> Self {
        Self::build(CortexConfig::default(), CortexWeights::default())
    }

    /// Create a cortex with a custom configuration.
    pub fn with_config(config: CortexConfig) -> WayfinderResult<Self> {
        config.validate()?;
        Ok(Self::build(config, CortexWeights::default()))
    }

    fn build(config: CortexConfig, weights: CortexWeights) -> Self {
        let buffer = ExperienceBuffer::new(config.max_buffer);
        Self {
            config,
            scorer: Arc::new(LexicalScorer::new()),
            state: Mutex::new(CortexState { weights, buffer }),
        }
    }

    /// Start from the given weights instead of the defaults.
    pub fn with_weights(self, weights: CortexWeights) -> Self {
        self.state.lock().weights = weights.sanitized();
        self
    }

    /// Replace the complexity scoring strategy.
    pub fn with_scorer(mut self, scorer: Arc<dyn ComplexityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &CortexConfig {
        &self.config
    }

    /// Complexity scorer used for live prompts and recorded tasks.
    pub fn scorer(&self) -> &Arc<dyn ComplexityScorer> {
        &self.scorer
    }

    /// Buffer an experience and re-optimize once the buffer reaches the
    /// update frequency. Returns the pass report when a pass ran.
    pub fn record_experience(&self, experience: Experience) -> Option<OptimizationReport> {
        let mut state = self.state.lock();
        debug!(
            task_id = %experience.task_id,
            capability = %experience.capability,
            success = experience.actual_success,
            "Cortex: experience recorded"
        );
        if let Some(evicted) = state.buffer.push(experience) {
            debug!(task_id = %evicted.task_id, "Cortex: buffer full, evicted oldest experience");
        }

        if state.buffer.len() >= self.config.update_frequency {
            self.run_pass(&mut state)
        } else {
            None
        }
    }

    /// Map a task, its prediction and its outcome into an [`Experience`].
    pub fn create_experience(
        &self,
        task: &TaskRecord,
        predicted: Prediction,
        actual: &ExecutionOutcome,
    ) -> Experience {
        Experience::new(task, predicted, actual)
    }

    /// Re-optimize now against whatever is buffered.
    pub fn optimize_now(&self) -> Option<OptimizationReport> {
        let mut state = self.state.lock();
        self.run_pass(&mut state)
    }

    fn run_pass(&self, state: &mut CortexState) -> Option<OptimizationReport> {
        if state.buffer.len() < self.config.min_batch {
            debug!(
                buffered = state.buffer.len(),
                min_batch = self.config.min_batch,
                "Cortex: batch too small, skipping re-optimization"
            );
            return None;
        }

        let batch = state.buffer.drain();
        let report = reoptimize(&mut state.weights, &batch, self.scorer.as_ref(), &self.config);
        if let Some(report) = &report {
            info!(
                batch_size = report.batch_size,
                update_count = report.update_count,
                confidence = report.confidence,
                "Cortex: re-optimization pass complete"
            );
        }
        report
    }

    /// Predicted token budget for a task.
    ///
    /// `floor(min(100 + entropy * buffer * multiplier * visual, 32000))`;
    /// capabilities without a thinking buffer always get `0`.
    pub fn predict_budget(&self, entropy: f64, capability: Capability, has_visual: bool) -> u64 {
        let buffer = MAX_THINKING_BUFFER[capability];
        if buffer == 0 {
            return 0;
        }
        let entropy = clamp_finite(entropy, 0.0, 1.0);
        let multiplier = self.state.lock().weights.budget_multiplier(capability);
        let visual = if has_visual { VISUAL_BUDGET_FACTOR } else { 1.0 };

        let budget = BASE_BUDGET as f64 + entropy * buffer as f64 * multiplier * visual;
        budget.min(MAX_BUDGET as f64).floor() as u64
    }

    /// Predicted probability of success, within `[0.1, 1.0]`.
    pub fn predict_success(&self, entropy: f64, capability: Capability) -> f64 {
        let entropy = clamp_finite(entropy, 0.0, 1.0);
        let preference = self.state.lock().weights.routing_preferences[capability];
        clamp_finite(
            preference - entropy * ENTROPY_SUCCESS_PENALTY,
            MIN_PREDICTED_SUCCESS,
            1.0,
        )
    }

    /// Both predictions for a recorded task.
    pub fn predict(&self, task: &TaskRecord) -> Prediction {
        Prediction {
            budget: self.predict_budget(task.entropy, task.capability, task.has_visual),
            success: self.predict_success(task.entropy, task.capability),
        }
    }

    /// Learned sampling temperature for `capability`.
    pub fn temperature(&self, capability: Capability) -> f64 {
        self.state.lock().weights.temperatures[capability]
    }

    /// Entropy of a prompt under the learned feature weights.
    pub fn estimate_entropy(&self, prompt: &str, history_len: usize, has_visual: bool) -> f64 {
        let features = self.scorer.features(prompt, history_len, has_visual);
        self.state.lock().weights.entropy_weights.estimate(&features)
    }

    /// Number of experiences waiting for the next pass.
    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Snapshot of learning progress over the current buffer.
    pub fn metrics(&self) -> CortexMetrics {
        let state = self.state.lock();
        let count = state.buffer.len();
        let n = count.max(1) as f64;

        let mut error = 0.0;
        let mut successes = 0.0;
        let mut quality = 0.0;
        for exp in state.buffer.iter() {
            error += (exp.predicted_success - exp.success_value()).abs();
            successes += exp.success_value();
            quality += exp.actual_quality;
        }

        CortexMetrics {
            buffered_experiences: count,
            average_prediction_error: error / n,
            success_rate: successes / n,
            average_quality: quality / n,
            convergence: state.weights.metadata.confidence,
            update_count: state.weights.metadata.update_count,
        }
    }

    /// Snapshot of the current weights.
    pub fn export_weights(&self) -> CortexWeights {
        self.state.lock().weights.clone()
    }

    /// Replace the weights with `weights` and drop buffered experiences.
    pub fn import_weights(&self, weights: CortexWeights) {
        let mut state = self.state.lock();
        state.weights = weights.sanitized();
        state.buffer.clear();
        info!(
            update_count = state.weights.metadata.update_count,
            "Cortex: weights imported"
        );
    }
}

impl Default for LearningCortex {
    fn default() -> Self {
        Self::new()
    }
}
