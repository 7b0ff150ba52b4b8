use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use wayfinder_core::{ComplexityScorer, LexicalScorer};
use wayfinder_cortex::CortexConfig;
use wayfinder_orchestrator::RoutingPolicy;

/// File name of the cortex weights snapshot inside `data_dir`.
pub const WEIGHTS_FILE: &str = "cortex-weights.json";

#[derive(Debug, Deserialize)]
pub struct WayfinderConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub routing: RoutingPolicy,
    #[serde(default)]
    pub cortex: CortexConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Default for WayfinderConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            routing: RoutingPolicy::default(),
            cortex: CortexConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoringConfig {
    /// Replaces the built-in complexity keywords when set.
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    /// Keyword feature assumed for recorded tasks that carry no text.
    #[serde(default)]
    pub keyword_proxy: Option<f64>,
}

impl ScoringConfig {
    pub fn build_scorer(&self) -> Arc<dyn ComplexityScorer> {
        let mut scorer = match &self.keywords {
            Some(keywords) => LexicalScorer::with_keywords(keywords.clone()),
            None => LexicalScorer::new(),
        };
        if let Some(proxy) = self.keyword_proxy {
            scorer = scorer.with_keyword_proxy(proxy);
        }
        Arc::new(scorer)
    }
}

impl WayfinderConfig {
    /// Load and validate the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let config = match tokio::fs::read_to_string(path).await {
            Ok(contents) => toml::from_str::<WayfinderConfig>(&contents).map_err(|e| {
                anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                WayfinderConfig::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            }
        };
        config.routing.validate()?;
        config.cortex.validate()?;
        Ok(config)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.data_dir.join(WEIGHTS_FILE)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
