//! Core types and error definitions for the Wayfinder routing workspace.
//!
//! This crate provides the foundational types shared by the orchestration
//! engine and the learning cortex: the closed capability set, outcome records
//! reported by the execution layer, the prompt complexity scoring strategy,
//! and the unified error type.
//!
//! # Main types
//!
//! - [`WayfinderError`]: Unified error enum for all Wayfinder subsystems.
//! - [`WayfinderResult`]: Convenience alias for `Result<T, WayfinderError>`.
//! - [`Capability`]: Closed set of execution capabilities a task can be routed to.
//! - [`CapabilityTable`]: Fixed-size per-capability table indexed by [`Capability`].
//! - [`ExecutionOutcome`]: Result record reported for a completed stage.
//! - [`ComplexityScorer`]: Strategy that turns prompts into entropy features.

/// Capability enum and the per-capability table.
pub mod capability;
/// Outcome records delivered by the execution layer.
pub mod outcome;
/// Entropy features, weights and the pluggable scoring strategy.
pub mod scoring;

pub use capability::{Capability, CapabilityTable};
pub use outcome::ExecutionOutcome;
pub use scoring::{ComplexityScorer, EntropyFeatures, EntropyWeights, LexicalScorer};

// --- Error types ---

/// Top-level error type for the Wayfinder workspace.
#[derive(Debug, thiserror::Error)]
pub enum WayfinderError {
    /// The budget or eligibility filter left no capability to choose from.
    #[error("No eligible capability (remaining budget: {remaining_budget} tokens)")]
    NoEligibleCapability {
        /// Token budget that was left when selection was attempted.
        remaining_budget: u64,
    },

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// The external execution collaborator failed to produce an outcome.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A weights snapshot could not be read or applied.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`WayfinderError`].
pub type WayfinderResult<T> = Result<T, WayfinderError>;

/// Clamp a value into `[min, max]`, mapping NaN to `min`.
pub fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
