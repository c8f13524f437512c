//! relwatch CLI Binary
//!
//! Command-line interface for the release watcher.

use clap::Parser;
use relwatch::cli::{Cli, RunContext, EXIT_ERROR};
use relwatch::config::ConfigLoader;
use relwatch::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(EXIT_ERROR);
    }

    info!(command = relwatch::cli::command_name(&cli.command), "relwatch starting");

    let context = match RunContext::new(cli.root.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{}", relwatch::cli::map_error(&e));
            process::exit(EXIT_ERROR);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            println!("{}", output.text);
            if output.exit_code != 0 {
                process::exit(output.exit_code);
            }
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", relwatch::cli::map_error(&e));
            process::exit(EXIT_ERROR);
        }
    }
}

/// Build logging configuration from CLI args, environment, and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.root)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
        // Keep verbose output visible when the config logs to a file only.
        if config.output == "file" {
            config.output = "file+stderr".to_string();
        }
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }

    let output_uses_file = config.output == "file" || config.output == "file+stderr";
    if config.enabled && output_uses_file {
        let resolved = relwatch::logging::resolve_log_file_path(
            cli.log_file.clone(),
            config.file.clone(),
            Some(cli.root.as_path()),
        );
        if let Ok(path) = resolved {
            config.file = Some(path);
        }
    } else if let Some(ref file) = cli.log_file {
        config.file = Some(file.clone());
    }

    config
}
