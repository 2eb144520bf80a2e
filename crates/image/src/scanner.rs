//! 이미지 병렬 스캔
//!
//! [`ImageScanner`]는 이미지 목록을 고른 뒤 세마포어로 동시 실행 수를 제한하며
//! 이미지마다 독립 태스크에서 추출과 크롤을 수행합니다.
//!
//! ```text
//! list_images ──▶ select ──▶ [Semaphore] ──▶ JoinSet
//!                                   │
//!                                   ├─ TempDir + export_filesystem
//!                                   ├─ spawn_blocking(Crawler::crawl)
//!                                   └─ Mutex<ImageScanSummary> 병합
//! ```

use std::sync::Arc;

use jarsniff_core::config::ImageSection;
use jarsniff_core::metrics::{IMAGE_SCANS_TOTAL, LABEL_RESULT};
use jarsniff_crawler::{CrawlError, Crawler, OutputMode, ReportSink, Reporter, Stats};
use metrics::counter;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ImageScanError;
use crate::source::{ImageRef, ImageSource};

/// 이미지 스캔 옵션
#[derive(Debug, Clone)]
pub struct ImageScanOptions {
    /// 동시에 스캔할 이미지 수 (최소 1)
    pub concurrency: usize,
    /// 태그 없는 이미지도 스캔
    pub include_untagged: bool,
    /// 레코드 출력 형식
    pub output: OutputMode,
}

impl ImageScanOptions {
    pub fn from_config(section: &ImageSection, output: OutputMode) -> Self {
        Self {
            concurrency: section.concurrency,
            include_untagged: section.include_untagged,
            output,
        }
    }
}

impl Default for ImageScanOptions {
    fn default() -> Self {
        Self::from_config(&ImageSection::default(), OutputMode::default())
    }
}

/// 전체 이미지 스캔 결과
#[derive(Debug, Clone, Default)]
pub struct ImageScanSummary {
    /// 모든 이미지의 통계 합계
    pub stats: Stats,
    /// 크롤까지 마친 이미지 수
    pub scanned: usize,
    /// 추출 또는 크롤에 실패한 이미지 수 (찾지 못한 이름 포함)
    pub failed: usize,
    /// 태그가 없어 건너뛴 이미지 수
    pub skipped_untagged: usize,
}

/// 컨테이너 이미지 스캐너
pub struct ImageScanner {
    crawler: Arc<Crawler>,
    options: ImageScanOptions,
    sink: ReportSink,
}

impl ImageScanner {
    pub fn new(crawler: Crawler, options: ImageScanOptions, sink: ReportSink) -> Self {
        Self {
            crawler: Arc::new(crawler),
            options,
            sink,
        }
    }

    /// 이미지들을 스캔하고 합친 결과를 돌려줍니다.
    ///
    /// `names`가 비어 있으면 목록의 모든 이미지를, 아니면 이름이 가리키는 이미지만 스캔합니다.
    /// 이미지 하나의 실패는 경고로 남기고 `failed`에 셉니다.
    ///
    /// # Errors
    ///
    /// - 목록 조회 실패
    /// - 취소 시 `ImageScanError::Cancelled` (그때까지의 합계 포함)
    pub async fn scan_images<S: ImageSource>(
        &self,
        source: Arc<S>,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<ImageScanSummary, ImageScanError> {
        let images = source.list_images().await?;
        let (targets, selected) = self.select(images, names);
        info!(
            images = targets.len(),
            concurrency = self.options.concurrency,
            "starting image scan"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let total = Arc::new(Mutex::new(selected));
        let mut tasks = JoinSet::new();

        for image in targets {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|e| ImageScanError::Task(e.to_string()))?
                }
            };

            let source = Arc::clone(&source);
            let crawler = Arc::clone(&self.crawler);
            let total = Arc::clone(&total);
            let cancel = cancel.clone();
            let reporter = Reporter::new(
                self.options.output,
                self.sink.clone(),
                crawler.config().disable_cve_2021_45105,
            )
            .with_image(image.id.clone(), image.tags.clone());

            tasks.spawn(async move {
                let _permit = permit;
                let result = scan_image(source.as_ref(), crawler, &image, reporter, cancel).await;
                let mut total = total.lock().await;
                match result {
                    Ok(stats) => {
                        info!(
                            image = %image.short_id(),
                            files = stats.files_scanned,
                            vulnerable = stats.vulnerable_files,
                            "image scanned"
                        );
                        total.stats.append(&stats);
                        total.scanned += 1;
                        counter!(IMAGE_SCANS_TOTAL, LABEL_RESULT => "success").increment(1);
                    }
                    Err(ImageScanError::Crawl(CrawlError::Cancelled { partial })) => {
                        debug!(image = %image.short_id(), "image scan cancelled");
                        total.stats.append(&partial.stats);
                    }
                    Err(e) => {
                        warn!(
                            image = %image.short_id(),
                            tags = ?image.tags,
                            error = %e,
                            "image scan failed, skipping"
                        );
                        total.failed += 1;
                        counter!(IMAGE_SCANS_TOTAL, LABEL_RESULT => "failure").increment(1);
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "image scan task panicked");
                total.lock().await.failed += 1;
            }
        }

        let summary = total.lock().await.clone();
        if cancel.is_cancelled() {
            return Err(ImageScanError::Cancelled {
                partial: Box::new(summary),
            });
        }
        Ok(summary)
    }

    /// 스캔 대상을 고르고 건너뛴/찾지 못한 수를 초기 합계에 담습니다.
    fn select(&self, images: Vec<ImageRef>, names: &[String]) -> (Vec<ImageRef>, ImageScanSummary) {
        let mut summary = ImageScanSummary::default();

        if names.is_empty() {
            let (targets, untagged): (Vec<_>, Vec<_>) = images
                .into_iter()
                .partition(|image| self.options.include_untagged || !image.is_untagged());
            for image in &untagged {
                debug!(image = %image.short_id(), "skipping untagged image");
            }
            summary.skipped_untagged = untagged.len();
            return (targets, summary);
        }

        let mut targets: Vec<ImageRef> = Vec::new();
        for name in names {
            match images.iter().find(|image| image.matches(name)) {
                Some(image) if targets.iter().any(|t| t.id == image.id) => {
                    debug!(name, "image already selected");
                }
                Some(image) => targets.push(image.clone()),
                None => {
                    warn!(name, "image not found, skipping");
                    summary.failed += 1;
                    counter!(IMAGE_SCANS_TOTAL, LABEL_RESULT => "failure").increment(1);
                }
            }
        }
        (targets, summary)
    }
}

/// 이미지 하나를 임시 디렉토리에 추출해 크롤합니다.
///
/// 임시 디렉토리는 반환 시점에 삭제됩니다.
async fn scan_image<S: ImageSource>(
    source: &S,
    crawler: Arc<Crawler>,
    image: &ImageRef,
    reporter: Reporter,
    cancel: CancellationToken,
) -> Result<Stats, ImageScanError> {
    let workdir = tempfile::Builder::new()
        .prefix("jarsniff-image-")
        .tempdir()?;
    let rootfs = workdir.path().join("rootfs");
    tokio::fs::create_dir(&rootfs).await?;

    info!(image = %image.short_id(), tags = ?image.tags, "exporting image filesystem");
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(image = %image.short_id(), "export cancelled");
            return Err(CrawlError::Cancelled {
                partial: Box::default(),
            }
            .into());
        }
        exported = source.export_filesystem(image, &rootfs) => exported?,
    }

    let mut reporter = reporter.with_path_prefix(rootfs.to_string_lossy().into_owned());
    let result = tokio::task::spawn_blocking(move || crawler.crawl(&rootfs, &mut reporter, &cancel))
        .await
        .map_err(|e| ImageScanError::Task(e.to_string()))??;

    for error in &result.errors {
        debug!(image = %image.short_id(), %error, "unscannable node");
    }
    drop(workdir);
    Ok(result.stats)
}
