//! 디렉토리 트리와 중첩 컨테이너 재귀 탐색
//!
//! [`Crawler::crawl`]은 루트 아래를 깊이 우선으로 순서대로 방문합니다.
//!
//! - 무시 패턴에 맞는 디렉토리는 통째로 건너뜁니다.
//! - 심볼릭 링크는 따라가지 않고, 일반 파일만 식별합니다.
//! - 컨테이너 파일은 엔트리를 가상 경로 `parent!entry` 로 방문하며, 엔트리가 다시
//!   컨테이너이면 메모리에 적재해 `max_archive_depth` 까지 재귀합니다.
//! - 노드 하나의 에러는 [`NodeError`]로 수집기와 결과에 기록하고 다음 노드로 넘어갑니다.
//!
//! 루트에 접근할 수 없거나 크롤이 취소된 경우에만 [`CrawlError`]를 반환합니다.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use jarsniff_core::metrics::{
    CRAWLER_ARCHIVES_OPENED_TOTAL, CRAWLER_FILES_SCANNED_TOTAL, CRAWLER_UNSCANNABLE_TOTAL,
    LABEL_FORMAT,
};

use crate::archive::{
    ArchiveEntry, Deadline, FormatType, ReaderRegistry, WalkControl, detect,
};
use crate::config::CrawlerConfig;
use crate::error::{ArchiveError, CrawlError};
use crate::identify::{Identification, Identifier, Identify};
use crate::node::{NodeContent, ScanNode};
use crate::stats::Stats;

/// 스캔하지 못한 노드
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeError {
    pub path: String,
    pub reason: String,
}

impl NodeError {
    pub fn new(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// 루트 하나를 크롤한 결과
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub stats: Stats,
    /// 크롤을 멈추지 않은 노드 단위 에러
    pub errors: Vec<NodeError>,
}

/// 식별 결과 수집기
///
/// 워커는 식별한 모든 노드를 `collect`에, 스캔하지 못한 노드를 `record_error`에 넘깁니다.
pub trait Collector {
    fn collect(&mut self, node: &ScanNode<'_>, identification: &Identification);

    fn record_error(&mut self, error: &NodeError);

    /// 지금까지의 누적 통계
    fn stats(&self) -> Stats;
}

/// 취소로 인한 중단
struct Interrupted;

fn record_error<C: Collector + ?Sized>(
    collector: &mut C,
    errors: &mut Vec<NodeError>,
    error: NodeError,
) {
    warn!(path = %error.path, reason = %error.reason, "skipping unscannable node");
    counter!(CRAWLER_UNSCANNABLE_TOTAL).increment(1);
    collector.record_error(&error);
    errors.push(error);
}

/// 재귀 크롤러
pub struct Crawler<I = Identifier> {
    config: CrawlerConfig,
    identifier: I,
    readers: Arc<ReaderRegistry>,
}

impl Crawler<Identifier> {
    /// 기본 리더 레지스트리와 기본 식별기로 크롤러를 만듭니다.
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        let readers = Arc::new(ReaderRegistry::default());
        let identifier = Identifier::new(&config, Arc::clone(&readers))?;
        Ok(Self::with_identifier(config, identifier, readers))
    }
}

impl<I: Identify> Crawler<I> {
    pub fn with_identifier(config: CrawlerConfig, identifier: I, readers: Arc<ReaderRegistry>) -> Self {
        Self {
            config,
            identifier,
            readers,
        }
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    fn is_ignored(&self, dir: &Path) -> bool {
        let path = dir.to_string_lossy();
        self.config
            .ignore_dirs
            .iter()
            .any(|pattern| pattern.is_match(&path))
    }

    /// `root` 아래를 크롤합니다. `root`는 디렉토리 또는 단일 파일입니다.
    pub fn crawl<C: Collector + ?Sized>(
        &self,
        root: &Path,
        collector: &mut C,
        cancel: &CancellationToken,
    ) -> Result<CrawlResult, CrawlError> {
        std::fs::metadata(root).map_err(|source| CrawlError::RootInaccessible {
            path: root.display().to_string(),
            source,
        })?;
        info!(root = %root.display(), "crawl started");

        let mut errors = Vec::new();
        let entries = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() > 0 && entry.file_type().is_dir() && self.is_ignored(entry.path()))
            });

        for entry in entries {
            if cancel.is_cancelled() {
                return Err(Self::cancelled(collector, errors));
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    record_error(collector, &mut errors, NodeError::new(path, &e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path().to_string_lossy().into_owned();
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    record_error(collector, &mut errors, NodeError::new(path, &e));
                    continue;
                }
            };
            let node = ScanNode {
                path: path.clone(),
                name: &path,
                size: metadata.len(),
                modified: metadata.modified().ok(),
                depth: 0,
                content: NodeContent::File(entry.path()),
            };
            if self.visit(&node, collector, &mut errors, cancel).is_err() {
                return Err(Self::cancelled(collector, errors));
            }
        }

        let stats = collector.stats();
        info!(
            root = %root.display(),
            files_scanned = stats.files_scanned,
            vulnerable_files = stats.vulnerable_files,
            errors = errors.len(),
            "crawl finished"
        );
        Ok(CrawlResult { stats, errors })
    }

    fn cancelled<C: Collector + ?Sized>(collector: &C, errors: Vec<NodeError>) -> CrawlError {
        let partial = CrawlResult {
            stats: collector.stats(),
            errors,
        };
        info!(files_scanned = partial.stats.files_scanned, "crawl cancelled");
        CrawlError::Cancelled {
            partial: Box::new(partial),
        }
    }

    /// 노드 하나를 식별하고 수집기에 넘깁니다.
    fn scan_node<C: Collector + ?Sized>(
        &self,
        node: &ScanNode<'_>,
        collector: &mut C,
        errors: &mut Vec<NodeError>,
        cancel: &CancellationToken,
    ) -> Result<(), Interrupted> {
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        match self.identifier.identify(node, cancel) {
            Ok(identification) => collector.collect(node, &identification),
            Err(e) => record_error(collector, errors, NodeError::new(&node.path, &e)),
        }
        counter!(CRAWLER_FILES_SCANNED_TOTAL).increment(1);
        Ok(())
    }

    /// 노드를 식별하고, 컨테이너이면 엔트리로 내려갑니다.
    fn visit<C: Collector + ?Sized>(
        &self,
        node: &ScanNode<'_>,
        collector: &mut C,
        errors: &mut Vec<NodeError>,
        cancel: &CancellationToken,
    ) -> Result<(), Interrupted> {
        self.scan_node(node, collector, errors, cancel)?;

        let (format, _) = detect(node.name);
        if !format.is_container() {
            return Ok(());
        }
        if node.depth >= self.config.max_archive_depth {
            warn!(
                path = %node.path,
                depth = node.depth,
                max_depth = self.config.max_archive_depth,
                "archive nesting limit reached, treating container as leaf"
            );
            return Ok(());
        }

        match self.descend(node, format, collector, errors, cancel) {
            Ok(()) => Ok(()),
            Err(ArchiveError::Cancelled) => Err(Interrupted),
            Err(e) => {
                record_error(collector, errors, NodeError::new(&node.path, &e));
                Ok(())
            }
        }
    }

    /// 중첩 컨테이너를 재귀용으로 메모리에 적재합니다. 한계를 넘으면 `None`.
    fn buffer_entry(&self, reader: &mut dyn Read, size: u64) -> Result<Option<Vec<u8>>, ArchiveError> {
        let limit = self.config.max_entry_size;
        if size > limit {
            return Ok(None);
        }
        let mut buf = Vec::new();
        reader.take(limit.saturating_add(1)).read_to_end(&mut buf)?;
        if buf.len() as u64 > limit {
            return Ok(None);
        }
        Ok(Some(buf))
    }

    fn descend<C: Collector + ?Sized>(
        &self,
        node: &ScanNode<'_>,
        format: FormatType,
        collector: &mut C,
        errors: &mut Vec<NodeError>,
        cancel: &CancellationToken,
    ) -> Result<(), ArchiveError> {
        let reader = self
            .readers
            .get(format)
            .ok_or(ArchiveError::Unsupported { format })?;
        let source = node
            .content
            .open_seekable()?
            .ok_or(ArchiveError::SourceUnavailable)?;
        counter!(CRAWLER_ARCHIVES_OPENED_TOTAL, LABEL_FORMAT => format.as_str()).increment(1);
        debug!(path = %node.path, format = %format, depth = node.depth, "descending into container");

        let deadline = Deadline::after(self.config.archive_list_timeout, cancel);
        reader.walk(
            source,
            &deadline,
            &mut |entry: ArchiveEntry<'_>| -> Result<WalkControl, ArchiveError> {
                let path = format!("{}!{}", node.path, entry.name);
                let depth = node.depth + 1;
                let (entry_format, _) = detect(entry.name);

                let outcome = if entry_format.is_container() {
                    let limit = self.config.max_entry_size;
                    let buffered = self
                        .buffer_entry(entry.reader, entry.size)
                        .and_then(|bytes| {
                            bytes.ok_or(ArchiveError::TooLarge {
                                size: entry.size,
                                limit,
                            })
                        });
                    match buffered {
                        Ok(bytes) => {
                            let child = ScanNode {
                                path,
                                name: entry.name,
                                size: entry.size,
                                modified: entry.modified,
                                depth,
                                content: NodeContent::Memory(&bytes),
                            };
                            self.visit(&child, collector, errors, cancel)
                        }
                        // 읽지 못한 중첩 컨테이너는 이름으로만 식별하고 형제 엔트리로 넘어감
                        Err(e) => {
                            record_error(collector, errors, NodeError::new(path.clone(), &e));
                            let child = ScanNode {
                                path,
                                name: entry.name,
                                size: entry.size,
                                modified: entry.modified,
                                depth,
                                content: NodeContent::stream(entry.reader),
                            };
                            self.scan_node(&child, collector, errors, cancel)
                        }
                    }
                } else {
                    let child = ScanNode {
                        path,
                        name: entry.name,
                        size: entry.size,
                        modified: entry.modified,
                        depth,
                        content: NodeContent::stream(entry.reader),
                    };
                    self.scan_node(&child, collector, errors, cancel)
                };

                // 자식 처리에 쓴 시간은 이 컨테이너의 기한에서 빼지 않음
                deadline.rearm();
                match outcome {
                    Ok(()) => Ok(WalkControl::Continue),
                    Err(Interrupted) => Err(ArchiveError::Cancelled),
                }
            },
        )
    }
}
