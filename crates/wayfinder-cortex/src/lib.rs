//! Learning cortex for adaptive routing.
//!
//! Buffers execution experiences, predicts token budgets, success
//! probabilities and temperatures per capability, and periodically
//! re-optimizes a small parametric model from the buffer.
//!
//! # Main types
//!
//! - [`LearningCortex`]: Owns the weights and the experience buffer behind one lock.
//! - [`CortexWeights`]: Entropy weights, budget multipliers, temperatures, routing preferences.
//! - [`Experience`]: One completed task with its prediction and outcome.
//! - [`OptimizationReport`]: Summary of a re-optimization pass.

/// Cortex configuration.
pub mod config;
/// The learning cortex itself.
pub mod cortex;
/// Experiences and the bounded FIFO buffer.
pub mod experience;
/// Batch re-optimization of the weights.
pub mod optimizer;
/// JSON snapshot persistence.
pub mod snapshot;
/// The parametric model.
pub mod weights;

pub use config::CortexConfig;
pub use cortex::{CortexMetrics, LearningCortex};
pub use experience::{Experience, ExperienceBuffer, Prediction, TaskRecord};
pub use optimizer::{BudgetAdjustment, BudgetRule, OptimizationReport};
pub use snapshot::{read_snapshot, write_snapshot};
pub use weights::{CortexWeights, WeightsMetadata};
