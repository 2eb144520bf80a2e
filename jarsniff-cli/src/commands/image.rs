//! `jarsniff image` command handler

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use jarsniff_core::config::JarsniffConfig;
use jarsniff_crawler::{Crawler, CrawlerConfig, OutputMode, ReportSink};
use jarsniff_image::{BollardImageSource, ImageScanError, ImageScanOptions, ImageScanner};

use crate::cli::ImageArgs;
use crate::error::CliError;

/// Apply the image-specific flags on top of the loaded config.
pub fn apply_image_flags(config: &mut JarsniffConfig, args: &ImageArgs) {
    if let Some(socket) = &args.docker_socket {
        config.image.docker_socket.clone_from(socket);
    }
    if let Some(concurrency) = args.concurrency {
        config.image.concurrency = concurrency;
    }
    if args.include_untagged {
        config.image.include_untagged = true;
    }
}

/// Execute the `image` command.
///
/// Scans the named images, or every listed image when none are named, and prints
/// one summary covering all of them.
pub async fn execute(
    args: ImageArgs,
    config: &JarsniffConfig,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let mode: OutputMode = config.output.format.parse()?;
    let crawler = Crawler::new(CrawlerConfig::from_core(&config.crawl)?)?;
    let source = Arc::new(BollardImageSource::connect(&config.image.docker_socket)?);

    let sink = ReportSink::stdout();
    let options = ImageScanOptions::from_config(&config.image, mode);
    let scanner = ImageScanner::new(crawler, options, sink.clone());

    let (summary, cancelled) = match scanner.scan_images(source, &args.images, &cancel).await {
        Ok(summary) => (summary, false),
        Err(ImageScanError::Cancelled { partial }) => (*partial, true),
        Err(e) => return Err(e.into()),
    };
    info!(
        scanned = summary.scanned,
        failed = summary.failed,
        skipped_untagged = summary.skipped_untagged,
        "image scan finished"
    );
    super::finish(&sink, config, mode, &summary.stats, cancelled)
}
