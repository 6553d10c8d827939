//! CLI module for the model retrain service
//!
//! - `serve`: HTTP API with the background retrain worker
//! - `retrain`: one retrain run in the foreground

pub mod retrain;
pub mod serve;

use clap::{Parser, Subcommand};

/// Model Retrain Service - background retraining with hyperparameter search
#[derive(Parser)]
#[command(name = "model-retrain-service")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API and the retrain worker
    Serve,

    /// Run a single retrain and exit
    Retrain(retrain::RetrainArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retrain_overrides() {
        let cli = Cli::try_parse_from(["model-retrain-service", "retrain", "--num-samples", "3"])
            .unwrap();

        match cli.command {
            Command::Retrain(args) => {
                assert_eq!(args.num_samples, Some(3));
                assert_eq!(args.seed, None);
            }
            Command::Serve => panic!("expected retrain"),
        }
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["model-retrain-service"]).is_err());
    }
}
