//! DS Reports - Main entry point

use clap::Parser;
use ds_reports::{commands, Cli, Commands, ReportError, Settings};
use ds_reports_common::logging::init_logging;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let Some(config_path) = cli.config.as_ref() else {
        eprintln!("Error: a configuration file is required (--config or DS_REPORTS_CONFIG)");
        process::exit(2);
    };

    let settings = match Settings::load(config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        },
    };

    // Environment variables take precedence over the config file's logging section
    let log_config = match settings.logging.clone().with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid LOG_* variables: {}", e);
            settings.logging.clone()
        },
    };
    let log_config = if cli.verbose {
        log_config.verbose()
    } else {
        log_config
    };

    let guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging is disabled: {}", e);
            None
        },
    };

    let result = execute_command(&cli, &settings).await;
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
    }

    // Flush buffered file logs before exiting
    drop(guard);
    if result.is_err() {
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, settings: &Settings) -> Result<(), ReportError> {
    match &cli.command {
        Commands::Prepare => {
            info!("Preparing reports");
            commands::prepare::run(settings).await
        },
        Commands::SignUpload => {
            info!("Signing and uploading reports");
            commands::upload::run(settings).await
        },
        Commands::Send { send_from, send_to } => {
            info!("Sending reports");
            commands::send::run(settings, *send_from, *send_to).await
        },
    }
}
