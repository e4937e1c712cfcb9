//! Titanic AutoML - Main Entry Point

use clap::Parser;
use titanic_automl::cli::{cmd_predict, cmd_run, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "titanic_automl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Predict { model }) => cmd_predict(&model)?,
        Some(Commands::Run) | None => cmd_run(&cli.run).await?,
    }

    Ok(())
}
