use clap::Parser;
use model_retrain_service::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Retrain(args) => cli::retrain::run(args).await,
    }
}
