mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use jarsniff_core::config::{GeneralConfig, JarsniffConfig};

use crate::cli::{Cli, Commands, OutputFormat};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            // the summary already tells the user what was found
            if !matches!(err, CliError::VulnerableFound(_)) {
                eprintln!("{} {err}", "error:".red().bold());
            }
            err.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        config: config_path,
        log_level,
        output,
        command,
    } = cli;

    match command {
        Commands::Config(args) => {
            let mut general = GeneralConfig::default();
            if let Some(level) = log_level {
                general.log_level = level;
            }
            init_logging(&general)?;
            let writer = OutputWriter::new(output.map(Into::into).unwrap_or_default());
            commands::config::execute(args, &config_path, &writer).await
        }
        Commands::Crawl(args) => {
            let config = prepare(&config_path, log_level.as_deref(), output, |config| {
                commands::apply_scan_flags(config, &args.flags);
            })
            .await?;
            let cancel = spawn_shutdown_listener();
            commands::crawl::execute(args, &config, cancel).await
        }
        Commands::Image(args) => {
            let config = prepare(&config_path, log_level.as_deref(), output, |config| {
                commands::apply_scan_flags(config, &args.flags);
                commands::image::apply_image_flags(config, &args);
            })
            .await?;
            let cancel = spawn_shutdown_listener();
            commands::image::execute(args, &config, cancel).await
        }
    }
}

/// Load config, layer the CLI flags on top, re-validate and start logging.
async fn prepare(
    config_path: &Path,
    log_level: Option<&str>,
    output: Option<OutputFormat>,
    apply_flags: impl FnOnce(&mut JarsniffConfig),
) -> Result<JarsniffConfig, CliError> {
    let mut config = commands::load_config(config_path).await?;
    commands::apply_global_overrides(&mut config, log_level, output);
    apply_flags(&mut config);
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    init_logging(&config.general)?;
    tracing::debug!(config = %config_path.display(), "configuration loaded");
    Ok(config)
}

fn init_logging(general: &GeneralConfig) -> Result<(), CliError> {
    logging::init_tracing(general).map_err(|e| CliError::Config(e.to_string()))
}

/// Cancel the returned token on SIGINT / SIGTERM.
fn spawn_shutdown_listener() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => {
                tracing::warn!(signal, "shutdown signal received, cancelling scan");
                token.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "failed to install signal handlers"),
        }
    });
    cancel
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
