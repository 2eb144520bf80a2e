//! Command handlers -- one module per subcommand

pub mod config;
pub mod crawl;
pub mod image;

use std::path::Path;

use tracing::{debug, info};

use jarsniff_core::config::JarsniffConfig;
use jarsniff_core::error::{ConfigError, JarsniffError};
use jarsniff_crawler::{OutputMode, ReportSink, Stats, Summary};

use crate::cli::{DEFAULT_CONFIG_PATH, OutputFormat, ScanFlags};
use crate::error::CliError;

/// Load the effective configuration.
///
/// A missing file at the default path falls back to built-in defaults plus env overrides.
/// An explicitly given path must exist.
pub async fn load_config(path: &Path) -> Result<JarsniffConfig, CliError> {
    match JarsniffConfig::load(path).await {
        Ok(config) => Ok(config),
        Err(JarsniffError::Config(ConfigError::FileNotFound { .. }))
            if path == Path::new(DEFAULT_CONFIG_PATH) =>
        {
            debug!(path = %path.display(), "config file not found, using defaults");
            let mut config = JarsniffConfig::default();
            config.apply_env_overrides();
            config
                .validate()
                .map_err(|e| CliError::Config(e.to_string()))?;
            Ok(config)
        }
        Err(e) => Err(CliError::Config(e.to_string())),
    }
}

/// Apply global flags (`--log-level`, `--output`) on top of the loaded config.
pub fn apply_global_overrides(
    config: &mut JarsniffConfig,
    log_level: Option<&str>,
    output: Option<OutputFormat>,
) {
    if let Some(level) = log_level {
        config.general.log_level = level.to_owned();
    }
    if let Some(format) = output {
        config.output.format = format.as_str().to_owned();
    }
}

/// Apply the shared scan flags on top of the loaded config.
pub fn apply_scan_flags(config: &mut JarsniffConfig, flags: &ScanFlags) {
    config
        .crawl
        .ignore_dirs
        .extend(flags.ignore_dirs.iter().cloned());
    if let Some(secs) = flags.archive_list_timeout {
        config.crawl.archive_list_timeout_secs = secs;
    }
    if flags.disable_cve_2021_45105 {
        config.crawl.disable_cve_2021_45105 = true;
    }
    if let Some(summary) = flags.summary_override() {
        config.output.summary = summary;
    }
}

/// Write the summary (when enabled) and turn the outcome into the exit status.
pub fn finish(
    sink: &ReportSink,
    config: &JarsniffConfig,
    mode: OutputMode,
    stats: &Stats,
    cancelled: bool,
) -> Result<(), CliError> {
    info!(
        files_scanned = stats.files_scanned,
        vulnerable = stats.vulnerable_files,
        unscannable = stats.unscannable_files,
        cancelled,
        "scan finished"
    );

    if config.output.summary {
        let summary = Summary::new(stats, config.crawl.disable_cve_2021_45105);
        sink.write_line(&summary.render(mode)?)?;
    }

    if cancelled {
        return Err(CliError::Cancelled);
    }
    if stats.count() > 0 {
        return Err(CliError::VulnerableFound(stats.count()));
    }
    Ok(())
}
