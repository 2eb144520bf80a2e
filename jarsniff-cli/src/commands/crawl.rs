//! `jarsniff crawl` command handler

use tokio_util::sync::CancellationToken;
use tracing::info;

use jarsniff_core::config::JarsniffConfig;
use jarsniff_crawler::{CrawlError, Crawler, CrawlerConfig, OutputMode, ReportSink, Reporter};

use crate::cli::CrawlArgs;
use crate::error::CliError;

/// Execute the `crawl` command.
///
/// Findings stream to stdout while the crawl runs; the summary follows at the end.
/// Returns `CliError::VulnerableFound` (exit code 4) when anything was reported.
pub async fn execute(
    args: CrawlArgs,
    config: &JarsniffConfig,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let mode: OutputMode = config.output.format.parse()?;
    let crawler_config = CrawlerConfig::from_core(&config.crawl)?;
    let disable_cve_2021_45105 = crawler_config.disable_cve_2021_45105;
    let crawler = Crawler::new(crawler_config)?;

    let sink = ReportSink::stdout();
    let mut reporter = Reporter::new(mode, sink.clone(), disable_cve_2021_45105);
    let root = args.root;
    info!(root = %root.display(), "starting crawl");

    let outcome = tokio::task::spawn_blocking(move || crawler.crawl(&root, &mut reporter, &cancel))
        .await
        .map_err(|e| CliError::Command(format!("crawl task failed: {e}")))?;

    let (stats, cancelled) = match outcome {
        Ok(result) => (result.stats, false),
        Err(CrawlError::Cancelled { partial }) => (partial.stats, true),
        Err(e) => return Err(e.into()),
    };
    super::finish(&sink, config, mode, &stats, cancelled)
}
