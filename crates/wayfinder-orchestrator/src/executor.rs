use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfinder_core::{Capability, ExecutionOutcome, WayfinderResult};

/// Everything the execution layer needs to run one stage attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Plan stage being executed.
    pub stage_id: Uuid,
    /// Selection this attempt belongs to.
    pub selection_id: Uuid,
    /// 0 for the planned attempt, then 1.. for fallback retries.
    pub attempt: u32,
    /// Capability chosen for the attempt.
    pub capability: Capability,
    /// Role label of the capability profile.
    pub role: String,
    /// System prompt of the capability profile.
    pub system_prompt: String,
    /// User prompt of the task.
    pub prompt: String,
    /// Predicted thinking budget in tokens; 0 means no extended thinking.
    pub thinking_budget: u64,
    /// Sampling temperature predicted by the cortex.
    pub temperature: f64,
}

/// Runs routed stages. Implemented by whatever actually talks to models.
///
/// An `Err` is treated like a failed outcome that consumed no tokens.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> WayfinderResult<ExecutionOutcome>;
}
