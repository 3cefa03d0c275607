//! Narrata CLI entry point.

use anyhow::Result;
use clap::Parser;
use narrata::cli::{commands, Cli, Commands};
use narrata::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| format!("narrata={}", log_level)));

    let file_layer = match settings.log_file() {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    // Execute command
    match &cli.command {
        Commands::Process { audio, force } => {
            commands::run_process(audio, *force, settings).await?;
        }

        Commands::Segment { transcript, narrator } => {
            commands::run_segment(transcript, narrator.as_deref(), settings).await?;
        }

        Commands::Project { action } => {
            commands::run_project(action, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
