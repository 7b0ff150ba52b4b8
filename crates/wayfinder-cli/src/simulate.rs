use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wayfinder_core::{Capability, CapabilityTable, ExecutionOutcome, WayfinderResult};
use wayfinder_orchestrator::{AgentExecutor, ExecutionRequest};

/// Prompts cycled through by `wayfinder simulate`.
pub const SAMPLE_PROMPTS: &[&str] = &[
    "What time zone is Lisbon in?",
    "Translate 'good morning' to French.",
    "Research the current approaches to vector search and summarize them.",
    "Analyze the tradeoffs between optimistic and pessimistic locking for this workload.",
    "Implement a rate limiter in Rust and debug the failing test.",
    "Design the architecture for a multi-region cache, compare two strategies and evaluate their failure modes.",
    "Write a short story about a lighthouse keeper.",
    "Refactor this module to remove the global state and explain the new algorithm.",
];

/// Stand-in executor with a fixed success probability per capability.
///
/// Token usage scales with the thinking budget it is handed, so the cortex
/// has a real signal to learn from.
pub struct SimulatedExecutor {
    success_odds: CapabilityTable<f64>,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(seed: u64) -> Self {
        Self {
            success_odds: CapabilityTable::new([0.95, 0.8, 0.75, 0.65, 0.85]),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn with_success_odds(mut self, capability: Capability, odds: f64) -> Self {
        self.success_odds[capability] = odds.clamp(0.0, 1.0);
        self
    }
}

/// Parse a `capability=probability` override for `--odds`.
pub fn parse_odds(s: &str) -> Result<(Capability, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CAPABILITY=PROBABILITY, got '{s}'"))?;
    let capability: Capability = name.parse()?;
    let odds: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid probability '{value}': {e}"))?;
    if !(0.0..=1.0).contains(&odds) {
        return Err(format!("probability {odds} is outside [0, 1]"));
    }
    Ok((capability, odds))
}

#[async_trait]
impl AgentExecutor for SimulatedExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> WayfinderResult<ExecutionOutcome> {
        let mut rng = self.rng.lock();
        let success = rng.gen_bool(self.success_odds[request.capability]);
        let base: u64 = rng.gen_range(200..1200);
        let tokens = base + request.thinking_budget / 2;
        let latency_ms = 300 + tokens / 4 + rng.gen_range(0..500);
        let quality = if success {
            rng.gen_range(0.6..1.0)
        } else {
            rng.gen_range(0.0..0.4)
        };
        Ok(ExecutionOutcome::new(success, tokens, latency_ms, quality))
    }
}
