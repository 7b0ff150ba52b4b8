//! `wayfinder` command line: plan, inspect, simulate and manage cortex weights.

mod config;
mod simulate;

use clap::{Parser, Subcommand};
use config::WayfinderConfig;
use simulate::{parse_odds, SimulatedExecutor, SAMPLE_PROMPTS};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wayfinder_core::Capability;
use wayfinder_cortex::{read_snapshot, write_snapshot, CortexWeights, LearningCortex};
use wayfinder_orchestrator::{AdaptiveRouter, OrchestrationEngine};

#[derive(Parser)]
#[command(name = "wayfinder", about = "Wayfinder: adaptive capability routing")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "wayfinder.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a routed plan for a prompt and print it as JSON
    Plan {
        prompt: String,
        #[arg(long, default_value_t = 3)]
        max_agents: usize,
        #[arg(long, default_value_t = 32_000)]
        budget: u64,
        /// The task carries images
        #[arg(long)]
        visual: bool,
    },
    /// Show entropy and per-capability predictions for a prompt
    Inspect {
        prompt: String,
        #[arg(long, default_value_t = 0)]
        history: usize,
        #[arg(long)]
        visual: bool,
    },
    /// Run synthetic tasks through the router and persist what the cortex learned
    Simulate {
        #[arg(long, default_value_t = 200)]
        tasks: usize,
        /// Seed for the synthetic executor
        #[arg(long, default_value_t = 7)]
        seed: u64,
        #[arg(long, default_value_t = 3)]
        max_agents: usize,
        #[arg(long, default_value_t = 32_000)]
        budget: u64,
        /// Override a capability's success probability, e.g. `--odds coding=0.2`
        #[arg(long, value_parser = parse_odds)]
        odds: Vec<(Capability, f64)>,
    },
    /// Manage the cortex weights snapshot
    Weights {
        #[command(subcommand)]
        action: WeightsAction,
    },
}

#[derive(Subcommand)]
enum WeightsAction {
    /// Print the current weights
    Show,
    /// Copy the current weights to a file
    Export { path: PathBuf },
    /// Replace the current weights with those in a file
    Import { path: PathBuf },
    /// Restore the default weights
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = WayfinderConfig::load(&cli.config).await?;
    let weights_path = config.weights_path();

    let weights = read_snapshot(&weights_path).await?.unwrap_or_default();
    let cortex = Arc::new(
        LearningCortex::with_config(config.cortex.clone())?
            .with_scorer(config.scoring.build_scorer())
            .with_weights(weights),
    );

    match cli.command {
        Commands::Plan {
            prompt,
            max_agents,
            budget,
            visual,
        } => {
            let router = build_router(&config, cortex)?;
            let routed = router.plan(&prompt, max_agents, budget, visual);
            println!("{}", serde_json::to_string_pretty(&routed)?);
        }
        Commands::Inspect {
            prompt,
            history,
            visual,
        } => {
            let entropy = cortex.estimate_entropy(&prompt, history, visual);
            println!("Entropy: {entropy:.3}");
            println!("{:<10} {:>8} {:>8} {:>6}", "capability", "budget", "success", "temp");
            for capability in Capability::ALL {
                println!(
                    "{:<10} {:>8} {:>8.3} {:>6.2}",
                    capability.to_string(),
                    cortex.predict_budget(entropy, capability, visual),
                    cortex.predict_success(entropy, capability),
                    cortex.temperature(capability),
                );
            }
        }
        Commands::Simulate {
            tasks,
            seed,
            max_agents,
            budget,
            odds,
        } => {
            let router = build_router(&config, cortex.clone())?;
            let executor = odds
                .into_iter()
                .fold(SimulatedExecutor::new(seed), |executor, (capability, p)| {
                    executor.with_success_odds(capability, p)
                });

            let (mut succeeded, mut passes) = (0usize, 0usize);
            for i in 0..tasks {
                let prompt = SAMPLE_PROMPTS[i % SAMPLE_PROMPTS.len()];
                let routed = router.plan(prompt, max_agents, budget, i % 5 == 0);
                let report = router.run_plan(&routed, &executor).await;
                if report.is_success() {
                    succeeded += 1;
                }
                passes += report.reoptimizations;
            }
            info!(tasks, succeeded, passes, "Simulation finished");

            write_snapshot(&weights_path, &cortex.export_weights()).await?;
            let summary = serde_json::json!({
                "tasks": tasks,
                "succeeded": succeeded,
                "reoptimizations": passes,
                "routing": router.engine().routing_analytics().to_json(),
                "cortex": cortex.metrics(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Weights { action } => match action {
            WeightsAction::Show => {
                println!("{}", serde_json::to_string_pretty(&cortex.export_weights())?);
            }
            WeightsAction::Export { path } => {
                write_snapshot(&path, &cortex.export_weights()).await?;
                println!("Weights exported to {}", path.display());
            }
            WeightsAction::Import { path } => {
                let weights = read_snapshot(&path)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("No weights snapshot at '{}'", path.display()))?;
                cortex.import_weights(weights);
                write_snapshot(&weights_path, &cortex.export_weights()).await?;
                println!("Weights imported from {}", path.display());
            }
            WeightsAction::Reset => {
                cortex.import_weights(CortexWeights::default());
                write_snapshot(&weights_path, &cortex.export_weights()).await?;
                println!("Weights reset to defaults");
            }
        },
    }

    Ok(())
}

fn build_router(config: &WayfinderConfig, cortex: Arc<LearningCortex>) -> anyhow::Result<AdaptiveRouter> {
    let engine = OrchestrationEngine::new(config.routing.clone())?
        .with_scorer(config.scoring.build_scorer())
        .with_entropy_weights(cortex.export_weights().entropy_weights);
    Ok(AdaptiveRouter::new(engine, cortex))
}
