//! 결과 수집과 보고
//!
//! [`Reporter`]는 워커가 넘긴 모든 노드를 [`Stats`]에 누적하고, 보고 대상인 경로만
//! 레코드 한 줄로 싱크에 씁니다. 여러 이미지를 병렬로 스캔할 때는 같은 [`ReportSink`]를
//! 공유하며, 줄 단위로 잠금을 잡으므로 레코드가 섞이지 않습니다.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use jarsniff_core::metrics::CRAWLER_VULNERABLE_FILES_TOTAL;

use crate::cve::Cve;
use crate::error::CrawlError;
use crate::finding::Evidence;
use crate::identify::Identification;
use crate::node::ScanNode;
use crate::stats::Stats;
use crate::version::Log4jVersion;
use crate::walker::{Collector, NodeError};

/// 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputMode {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CrawlError::Config {
                field: "output.format".to_owned(),
                reason: format!("unknown output format '{other}'"),
            }),
        }
    }
}

/// 줄 단위로 잠그는 공유 출력 싱크
#[derive(Clone)]
pub struct ReportSink(Arc<Mutex<Box<dyn Write + Send>>>);

impl ReportSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// 한 줄을 원자적으로 씁니다.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self
            .0
            .lock()
            .map_err(|_| io::Error::other("report sink lock poisoned"))?;
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

impl fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSink").finish_non_exhaustive()
    }
}

/// 취약 경로 레코드
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingRecord<'a> {
    pub path: String,
    pub jar_name_matched: bool,
    pub jar_name_inside_archive_matched: bool,
    pub class_name_matched: bool,
    pub class_package_and_name_matched: bool,
    pub class_file_md5_matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log4j_version: Option<&'a Log4jVersion>,
    pub cves: Vec<Cve>,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<&'a str>,
    #[serde(skip_serializing_if = "no_tags")]
    pub image_tags: &'a [String],
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

impl FindingRecord<'_> {
    /// `key: value, ...` 형태의 한 줄
    pub fn to_text(&self) -> String {
        let mut parts = vec![format!("path: {}", self.path)];
        for (evidence, matched) in [
            (Evidence::JarName, self.jar_name_matched),
            (Evidence::JarNameInsideArchive, self.jar_name_inside_archive_matched),
            (Evidence::ClassName, self.class_name_matched),
            (Evidence::ClassPackageAndName, self.class_package_and_name_matched),
            (Evidence::ClassFileMd5, self.class_file_md5_matched),
        ] {
            parts.push(format!("{}: {matched}", evidence.field_name()));
        }
        if let Some(version) = self.log4j_version {
            parts.push(format!("log4jVersion: {version}"));
        }
        let cves: Vec<_> = self.cves.iter().map(Cve::id).collect();
        parts.push(format!("cves: {}", cves.join(" ")));
        parts.push(format!("fileSize: {}", self.file_size));
        if let Some(id) = self.image_id {
            parts.push(format!("imageId: {id}"));
        }
        if !self.image_tags.is_empty() {
            parts.push(format!("imageTags: {}", self.image_tags.join(" ")));
        }
        parts.join(", ")
    }
}

/// 크롤 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub message: &'static str,
    pub files_scanned: u64,
    pub vulnerable_file_count: u64,
    pub unscannable_file_count: u64,
}

impl Summary {
    pub fn new(stats: &Stats, disable_cve_2021_45105: bool) -> Self {
        let detected = stats.count() > 0;
        let message = match (disable_cve_2021_45105, detected) {
            (false, true) => "Files affected by CVE-2021-45046 or CVE-2021-45105 detected",
            (false, false) => "No files affected by CVE-2021-45046 or CVE-2021-45105 detected",
            (true, true) => "Files affected by CVE-2021-45046 detected",
            (true, false) => "No files affected by CVE-2021-45046 detected",
        };
        Self {
            message,
            files_scanned: stats.files_scanned,
            vulnerable_file_count: stats.count(),
            unscannable_file_count: stats.unscannable_files,
        }
    }

    pub fn render(&self, mode: OutputMode) -> Result<String, serde_json::Error> {
        match mode {
            OutputMode::Json => serde_json::to_string(self),
            OutputMode::Text => Ok(format!(
                "{}\nfilesScanned: {}\nvulnerableFileCount: {}\nunscannableFileCount: {}",
                self.message,
                self.files_scanned,
                self.vulnerable_file_count,
                self.unscannable_file_count
            )),
        }
    }
}

/// 이미지 스캔 시 레코드에 붙는 이미지 정보
#[derive(Debug, Clone, Default)]
struct ImageContext {
    id: String,
    tags: Vec<String>,
}

/// 통계를 누적하고 보고 대상 레코드를 스트리밍하는 수집기
#[derive(Debug)]
pub struct Reporter {
    mode: OutputMode,
    sink: ReportSink,
    disable_cve_2021_45105: bool,
    image: Option<ImageContext>,
    path_prefix: Option<String>,
    stats: Stats,
}

impl Reporter {
    pub fn new(mode: OutputMode, sink: ReportSink, disable_cve_2021_45105: bool) -> Self {
        Self {
            mode,
            sink,
            disable_cve_2021_45105,
            image: None,
            path_prefix: None,
            stats: Stats::default(),
        }
    }

    /// 레코드에 이미지 ID와 태그를 붙입니다.
    pub fn with_image(mut self, id: impl Into<String>, tags: Vec<String>) -> Self {
        self.image = Some(ImageContext {
            id: id.into(),
            tags,
        });
        self
    }

    /// 보고 경로에서 떼어낼 접두어 (이미지 추출 디렉토리)
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    fn display_path(&self, path: &str) -> String {
        match self
            .path_prefix
            .as_deref()
            .and_then(|prefix| path.strip_prefix(prefix))
        {
            Some(rest) if rest.starts_with('/') => rest.to_owned(),
            Some(rest) => format!("/{rest}"),
            None => path.to_owned(),
        }
    }

    /// 보고할 CVE 목록. 보고 대상이 아니면 `None`.
    fn reportable_cves(&self, identification: &Identification) -> Option<Vec<Cve>> {
        let mut cves = identification.cves();
        if self.disable_cve_2021_45105 {
            cves.retain(|cve| *cve != Cve::Cve2021_45105);
        }
        (!cves.is_empty()).then_some(cves)
    }
}

impl Collector for Reporter {
    fn collect(&mut self, node: &ScanNode<'_>, identification: &Identification) {
        self.stats.files_scanned += 1;
        let finding = &identification.finding;
        if finding.is_empty() {
            return;
        }
        self.stats.record_finding(finding);

        let Some(cves) = self.reportable_cves(identification) else {
            debug!(path = %node.path, "finding only affected by CVE-2021-45105, suppressed");
            return;
        };
        self.stats.vulnerable_files += 1;
        counter!(CRAWLER_VULNERABLE_FILES_TOTAL).increment(1);

        let record = FindingRecord {
            path: self.display_path(&node.path),
            jar_name_matched: finding.contains(Evidence::JarName),
            jar_name_inside_archive_matched: finding.contains(Evidence::JarNameInsideArchive),
            class_name_matched: finding.contains(Evidence::ClassName),
            class_package_and_name_matched: finding.contains(Evidence::ClassPackageAndName),
            class_file_md5_matched: finding.contains(Evidence::ClassFileMd5),
            log4j_version: identification.version.as_ref(),
            cves,
            file_size: node.size,
            image_id: self.image.as_ref().map(|image| image.id.as_str()),
            image_tags: self
                .image
                .as_ref()
                .map(|image| image.tags.as_slice())
                .unwrap_or_default(),
        };
        let line = match self.mode {
            OutputMode::Text => record.to_text(),
            OutputMode::Json => match serde_json::to_string(&record) {
                Ok(line) => line,
                Err(e) => {
                    warn!(path = %record.path, error = %e, "failed to serialize finding record");
                    return;
                }
            },
        };
        if let Err(e) = self.sink.write_line(&line) {
            warn!(error = %e, "failed to write finding record");
        }
    }

    fn record_error(&mut self, _error: &NodeError) {
        self.stats.unscannable_files += 1;
    }

    fn stats(&self) -> Stats {
        self.stats
    }
}
