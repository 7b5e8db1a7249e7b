//! Taxa CLI - Main entry point

use clap::Parser;
use std::process;
use taxa_cli::{commands, Cli, CliError, Commands};
use taxa_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Progress bar owns the terminal; only warnings are logged unless verbose
    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .output(LogOutput::Console)
        .log_file_prefix("taxa")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        let cli_error = e.downcast_ref::<CliError>();
        if cli_error.is_some_and(CliError::is_cancelled) {
            warn!("Command cancelled");
            eprintln!("Cancelled");
        } else {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
        }
        process::exit(cli_error.map_or(1, CliError::exit_code));
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Children { taxon_id, json } => {
            commands::children::run(cli, *taxon_id, *json).await?
        },
        Commands::CachePath => commands::cache_path::run(cli)?,
    }
    Ok(())
}
