//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use jarsniff_crawler::OutputMode;

/// Config file used when `--config` is not given. A missing default file is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "jarsniff.toml";

/// jarsniff -- find log4j CVE-2021-45046 / CVE-2021-45105 exposure.
///
/// Use `jarsniff <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "jarsniff", version, about, long_about = None)]
pub struct Cli {
    /// Path to the jarsniff.toml configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format (overrides `[output].format`).
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `key: value, ...` line per finding.
    Text,
    /// One JSON object per line.
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => OutputMode::Text,
            OutputFormat::Json => OutputMode::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a directory tree (or a single file) for vulnerable log4j.
    Crawl(CrawlArgs),

    /// Scan local container images.
    Image(ImageArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- shared scan flags ----

/// Flags that override the `[crawl]` and `[output]` sections.
#[derive(Args, Debug, Default)]
pub struct ScanFlags {
    /// Skip directories whose path matches this regex (repeatable).
    #[arg(long = "ignore-dir", value_name = "REGEX")]
    pub ignore_dirs: Vec<String>,

    /// Per-archive listing timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub archive_list_timeout: Option<u64>,

    /// Do not report files that are only affected by CVE-2021-45105.
    #[arg(long = "disable-cve-2021-45105-detection")]
    pub disable_cve_2021_45105: bool,

    /// Print the summary block after the findings.
    #[arg(long, overrides_with = "no_summary")]
    pub summary: bool,

    /// Do not print the summary block.
    #[arg(long, overrides_with = "summary")]
    pub no_summary: bool,
}

impl ScanFlags {
    /// `Some` only when one of `--summary` / `--no-summary` was given.
    pub fn summary_override(&self) -> Option<bool> {
        match (self.summary, self.no_summary) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

// ---- crawl ----

/// Crawl a path.
#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Directory or file to scan.
    pub root: PathBuf,

    #[command(flatten)]
    pub flags: ScanFlags,
}

// ---- image ----

/// Scan container images.
#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Image IDs, ID prefixes or `repo:tag` names (default: every tagged image).
    pub images: Vec<String>,

    /// Docker socket path (overrides `[image].docker_socket`).
    #[arg(long)]
    pub docker_socket: Option<String>,

    /// Number of images scanned at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Also scan images without a tag.
    #[arg(long)]
    pub include_untagged: bool,

    #[command(flatten)]
    pub flags: ScanFlags,
}

// ---- config ----

/// Manage jarsniff configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, crawl, output, image).
        #[arg(long)]
        section: Option<String>,
    },
}
