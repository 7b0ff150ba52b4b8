//! Integration tests for the learning cortex: auto re-optimization, buffer
//! bounds, snapshot round trips and concurrent recording.

use std::sync::Arc;
use uuid::Uuid;
use wayfinder_core::{Capability, ExecutionOutcome};
use wayfinder_cortex::*;

fn task(capability: Capability, entropy: f64, prompt_len: usize) -> TaskRecord {
    TaskRecord {
        task_id: Uuid::new_v4(),
        capability,
        entropy,
        prompt_len,
        has_visual: prompt_len % 3 == 0,
        history_len: prompt_len % 11,
    }
}

fn feed(cortex: &LearningCortex, capability: Capability, success: bool, quality: f64) -> Option<OptimizationReport> {
    let task = task(capability, 0.55, 640);
    let predicted = cortex.predict(&task);
    let outcome = ExecutionOutcome::new(success, 1100, 3000, quality);
    cortex.record_experience(cortex.create_experience(&task, predicted, &outcome))
}

#[test]
fn test_coding_failures_grow_coding_budget() {
    let cortex = LearningCortex::new();
    let before = cortex.export_weights().budget_multipliers[Capability::Coding];

    let mut reports = Vec::new();
    for _ in 0..100 {
        if let Some(report) = feed(&cortex, Capability::Coding, false, 0.1) {
            reports.push(report);
        }
    }

    assert_eq!(reports.len(), 1);
    let after = cortex.export_weights().budget_multipliers[Capability::Coding];
    assert!((after - before * 1.1).abs() < 1e-12);
    assert_eq!(cortex.buffered(), 0);
}

#[test]
fn test_entropy_weights_sum_to_one_after_passes() {
    let cortex = LearningCortex::new();
    for i in 0..1000 {
        let capability = Capability::ALL[i % Capability::COUNT];
        feed(&cortex, capability, i % 3 != 0, (i % 10) as f64 / 10.0);
    }
    let weights = cortex.export_weights();
    assert_eq!(weights.metadata.update_count, 10);
    assert!((weights.entropy_weights.sum() - 1.0).abs() < 1e-9);
    assert!(weights.entropy_weights.within_ranges());
}

#[test]
fn test_buffer_never_exceeds_cap() {
    // a pass drains the buffer exactly when it reaches the cap
    let config = CortexConfig {
        update_frequency: 1000,
        ..CortexConfig::default()
    };
    let cortex = LearningCortex::with_config(config).unwrap();
    for i in 0..2500 {
        feed(&cortex, Capability::Research, i % 2 == 0, 0.6);
        assert!(cortex.buffered() <= 1000);
    }
    assert_eq!(cortex.export_weights().metadata.update_count, 2);
    assert_eq!(cortex.buffered(), 500);
}

#[test]
fn test_unreachable_frequency_is_rejected() {
    let config = CortexConfig {
        update_frequency: 5000,
        ..CortexConfig::default()
    };
    assert!(LearningCortex::with_config(config).is_err());
}

#[test]
fn test_confidence_never_decreases() {
    let cortex = LearningCortex::new();
    let mut last = cortex.export_weights().metadata.confidence;
    for i in 0..1500 {
        feed(&cortex, Capability::Analysis, i % 4 != 0, 0.8);
        let confidence = cortex.export_weights().metadata.confidence;
        assert!(confidence >= last);
        last = confidence;
    }
    assert!(last <= 1.0);
}

#[test]
fn test_export_import_round_trip() {
    let trained = LearningCortex::new();
    for i in 0..300 {
        feed(&trained, Capability::ALL[i % Capability::COUNT], i % 5 == 0, 0.4);
    }

    let snapshot = trained.export_weights();
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: CortexWeights = serde_json::from_str(&json).unwrap();

    let fresh = LearningCortex::new();
    fresh.import_weights(restored);

    for capability in Capability::ALL {
        for entropy in [0.0, 0.25, 0.5, 0.9, 1.0] {
            for visual in [false, true] {
                assert_eq!(
                    fresh.predict_budget(entropy, capability, visual),
                    trained.predict_budget(entropy, capability, visual)
                );
            }
            assert_eq!(
                fresh.predict_success(entropy, capability),
                trained.predict_success(entropy, capability)
            );
        }
        assert_eq!(fresh.temperature(capability), trained.temperature(capability));
    }
}

#[test]
fn test_concurrent_recording_is_serialized() {
    let cortex = Arc::new(LearningCortex::new());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cortex = cortex.clone();
            std::thread::spawn(move || {
                for i in 0..125 {
                    feed(&cortex, Capability::ALL[(worker + i) % Capability::COUNT], i % 2 == 0, 0.7);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 1000 experiences at a frequency of 100 => exactly 10 passes, empty buffer
    let weights = cortex.export_weights();
    assert_eq!(weights.metadata.update_count, 10);
    assert_eq!(cortex.buffered(), 0);
}
