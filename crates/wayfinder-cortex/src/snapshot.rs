use crate::weights::CortexWeights;
use std::path::Path;
use tracing::info;
use wayfinder_core::{WayfinderError, WayfinderResult};

/// Write a weights snapshot as pretty-printed JSON, creating parent directories.
pub async fn write_snapshot(path: &Path, weights: &CortexWeights) -> WayfinderResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(weights)?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), "Weights snapshot written");
    Ok(())
}

/// Read a weights snapshot written by [`write_snapshot`].
///
/// Returns `Ok(None)` when the file does not exist.
pub async fn read_snapshot(path: &Path) -> WayfinderResult<Option<CortexWeights>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let weights: CortexWeights = serde_json::from_str(&contents).map_err(|e| {
        WayfinderError::Snapshot(format!(
            "invalid weights snapshot '{}': {e}",
            path.display()
        ))
    })?;
    Ok(Some(weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LearningCortex, TaskRecord};
    use wayfinder_core::{Capability, ExecutionOutcome};

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("weights.json");

        let mut weights = CortexWeights::default();
        weights.budget_multipliers[Capability::Coding] = 1.331;
        write_snapshot(&path, &weights).await.unwrap();

        let loaded = read_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(loaded, weights);
    }

    #[tokio::test]
    async fn test_learned_weights_survive_snapshot_exactly() {
        let cortex = LearningCortex::new();
        for i in 0..300usize {
            let task = TaskRecord {
                task_id: uuid::Uuid::new_v4(),
                capability: Capability::ALL[i % Capability::COUNT],
                entropy: (i % 17) as f64 / 17.0,
                prompt_len: 40 + i * 7,
                has_visual: i % 4 == 0,
                history_len: i % 9,
            };
            let predicted = cortex.predict(&task);
            let outcome = ExecutionOutcome::new(i % 3 != 0, 800 + i as u64, 2000, (i % 10) as f64 / 10.0);
            cortex.record_experience(cortex.create_experience(&task, predicted, &outcome));
        }
        let learned = cortex.export_weights();
        assert_eq!(learned.metadata.update_count, 3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        write_snapshot(&path, &learned).await.unwrap();
        let loaded = read_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(loaded, learned);

        let restored = LearningCortex::new().with_weights(loaded);
        for capability in Capability::ALL {
            for entropy in [0.0, 0.37, 0.81] {
                assert_eq!(
                    restored.predict_success(entropy, capability).to_bits(),
                    cortex.predict_success(entropy, capability).to_bits()
                );
                assert_eq!(
                    restored.predict_budget(entropy, capability, true),
                    cortex.predict_budget(entropy, capability, true)
                );
            }
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = read_snapshot(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_snapshot_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        tokio::fs::write(&path, "{\"entropy_weights\": 3}").await.unwrap();
        let err = read_snapshot(&path).await.unwrap_err();
        assert!(matches!(err, WayfinderError::Snapshot(_)));
    }
}
