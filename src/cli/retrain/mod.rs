//! Retrain command - runs the pipeline once in the foreground

use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::retrain::{Retrainer, RunId};
use crate::infrastructure::logging::init_logging;

#[derive(Args, Debug, Clone, Default)]
pub struct RetrainArgs {
    /// Override `training.num_samples`
    #[arg(long)]
    pub num_samples: Option<usize>,

    /// Override `training.seed`
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RetrainArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(num_samples) = self.num_samples {
            config.training.num_samples = num_samples;
        }
        if let Some(seed) = self.seed {
            config.training.seed = seed;
        }
    }
}

/// Exits with an error when any stage fails
pub async fn run(args: RetrainArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load()?;
    args.apply(&mut config);
    init_logging(&config.logging);

    let orchestrator = crate::build_orchestrator(&config);
    let outcome = orchestrator.retrain(&RunId::generate()).await;

    match &outcome.artifact {
        Some(artifact) if outcome.succeeded() => {
            info!(
                run_id = %outcome.run_id,
                model_name = %artifact.model_name,
                score = artifact.score,
                directory = %artifact.directory.display(),
                "Retrain finished"
            );
            println!("{}", serde_json::to_string_pretty(artifact)?);
            Ok(())
        }
        _ => {
            let stage = outcome
                .failed_stage()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            anyhow::bail!(
                "retrain {} failed at stage {}: {}",
                outcome.run_id,
                stage,
                outcome.error.as_deref().unwrap_or("no error recorded")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_only_when_set() {
        let mut config = AppConfig::default();
        let seed = config.training.seed;

        RetrainArgs {
            num_samples: Some(2),
            seed: None,
        }
        .apply(&mut config);

        assert_eq!(config.training.num_samples, 2);
        assert_eq!(config.training.seed, seed);
    }
}
