use serde::{Deserialize, Serialize};

/// Outcome of one completed stage, as reported by the execution layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Whether the executor reported success.
    pub success: bool,
    /// Tokens consumed by the call.
    pub tokens_used: u64,
    /// Wall-clock latency.
    pub latency_ms: u64,
    /// Judged output quality in `[0, 1]`.
    pub quality: f64,
}

impl ExecutionOutcome {
    /// Create an outcome, clamping `quality` into `[0, 1]`.
    pub fn new(success: bool, tokens_used: u64, latency_ms: u64, quality: f64) -> Self {
        Self {
            success,
            tokens_used,
            latency_ms,
            quality: crate::clamp_finite(quality, 0.0, 1.0),
        }
    }

    /// Shorthand for a failed outcome with zero quality.
    pub fn failure(tokens_used: u64, latency_ms: u64) -> Self {
        Self::new(false, tokens_used, latency_ms, 0.0)
    }

    /// Success as a `0.0` / `1.0` sample.
    pub fn success_value(&self) -> f64 {
        if self.success {
            1.0
        } else {
            0.0
        }
    }
}
