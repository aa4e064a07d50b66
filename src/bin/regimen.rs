//! Regimen CLI Binary
//!
//! Command-line entry point for staged workout store generation.

use clap::Parser;
use regimen::cli::{exit_code, map_error, Cli, RunContext};
use regimen::config::ConfigLoader;
use regimen::emission::CancelFlag;
use regimen::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("regimen starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "failed to initialize run context");
            eprintln!("{}", map_error(&e));
            process::exit(exit_code(&e));
        }
    };

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after in-flight work");
            on_interrupt.cancel();
        }
    });

    match context.execute(&cli.command, cancel).await {
        Ok(output) => {
            info!("command completed");
            println!("{}", output);
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{}", map_error(&e));
            process::exit(exit_code(&e));
        }
    }
}

/// Logging config from the config file, overridden by CLI flags.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }
    config
}
