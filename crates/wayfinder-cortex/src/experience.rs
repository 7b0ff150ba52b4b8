use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;
use wayfinder_core::{Capability, ExecutionOutcome};

/// Decision-time description of a routed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Correlates the task with its outcome.
    pub task_id: Uuid,
    /// Capability the task was routed to.
    pub capability: Capability,
    /// Entropy estimated at routing time.
    pub entropy: f64,
    /// Prompt length in chars.
    pub prompt_len: usize,
    /// Whether the task carried images.
    pub has_visual: bool,
    /// Prior turns in the conversation.
    pub history_len: usize,
}

/// What the cortex predicted when the task was routed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted thinking budget in tokens.
    pub budget: u64,
    /// Predicted success probability.
    pub success: f64,
}

/// One completed task: input features, prediction and observed outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Task this experience came from.
    pub task_id: Uuid,
    /// Entropy estimated at routing time.
    pub entropy: f64,
    /// Capability that ran.
    pub capability: Capability,
    /// Prompt length in chars.
    pub prompt_len: usize,
    /// Whether the task carried images.
    pub has_visual: bool,
    /// Prior turns in the conversation.
    pub history_len: usize,
    /// Budget the cortex predicted.
    pub predicted_budget: u64,
    /// Success probability the cortex predicted.
    pub predicted_success: f64,
    /// Tokens actually used.
    pub actual_budget: u64,
    /// Whether the executor reported success.
    pub actual_success: bool,
    /// Observed quality in `[0, 1]`.
    pub actual_quality: f64,
    /// Observed latency.
    pub actual_latency_ms: u64,
    /// When the experience was created.
    pub timestamp: DateTime<Utc>,
}

impl Experience {
    /// Combine a task, its prediction and its outcome. Pure mapping.
    pub fn new(task: &TaskRecord, predicted: Prediction, actual: &ExecutionOutcome) -> Self {
        Self {
            task_id: task.task_id,
            entropy: task.entropy,
            capability: task.capability,
            prompt_len: task.prompt_len,
            has_visual: task.has_visual,
            history_len: task.history_len,
            predicted_budget: predicted.budget,
            predicted_success: predicted.success,
            actual_budget: actual.tokens_used,
            actual_success: actual.success,
            actual_quality: actual.quality,
            actual_latency_ms: actual.latency_ms,
            timestamp: Utc::now(),
        }
    }

    /// Observed success as a `0.0` / `1.0` sample.
    pub fn success_value(&self) -> f64 {
        if self.actual_success {
            1.0
        } else {
            0.0
        }
    }
}

/// Bounded FIFO of experiences; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ExperienceBuffer {
    entries: VecDeque<Experience>,
    capacity: usize,
}

impl ExperienceBuffer {
    /// Create a buffer holding at most `capacity` experiences (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an experience, returning the evicted one if the buffer was full.
    pub fn push(&mut self, experience: Experience) -> Option<Experience> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(experience);
        evicted
    }

    /// Number of buffered experiences.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of buffered experiences.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffered experiences, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.entries.iter()
    }

    /// Take every buffered experience, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Experience> {
        self.entries.drain(..).collect()
    }

    /// Drop every buffered experience.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(capability: Capability) -> TaskRecord {
        TaskRecord {
            task_id: Uuid::new_v4(),
            capability,
            entropy: 0.6,
            prompt_len: 420,
            has_visual: false,
            history_len: 3,
        }
    }

    fn experience() -> Experience {
        Experience::new(
            &task(Capability::Research),
            Prediction {
                budget: 900,
                success: 0.7,
            },
            &ExecutionOutcome::new(true, 850, 2100, 0.8),
        )
    }

    #[test]
    fn test_create_experience_maps_fields() {
        let record = task(Capability::Coding);
        let exp = Experience::new(
            &record,
            Prediction {
                budget: 1200,
                success: 0.65,
            },
            &ExecutionOutcome::new(false, 1500, 4000, 0.2),
        );
        assert_eq!(exp.task_id, record.task_id);
        assert_eq!(exp.capability, Capability::Coding);
        assert_eq!(exp.predicted_budget, 1200);
        assert_eq!(exp.actual_budget, 1500);
        assert!(!exp.actual_success);
        assert_eq!(exp.success_value(), 0.0);
        assert_eq!(exp.actual_latency_ms, 4000);
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = ExperienceBuffer::new(3);
        let first = experience();
        let first_id = first.task_id;
        buffer.push(first);
        buffer.push(experience());
        buffer.push(experience());
        let evicted = buffer.push(experience());
        assert_eq!(evicted.map(|e| e.task_id), Some(first_id));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_buffer_drain_empties() {
        let mut buffer = ExperienceBuffer::new(10);
        buffer.push(experience());
        buffer.push(experience());
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut buffer = ExperienceBuffer::new(0);
        buffer.push(experience());
        buffer.push(experience());
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.len(), 1);
    }
}
