//! 크롤러 설정
//!
//! [`CrawlerConfig`]는 `jarsniff-core`의 [`CrawlSection`]에서 변환하거나
//! [`CrawlerConfigBuilder`]로 직접 만듭니다. 정규식은 생성 시점에 한 번 컴파일됩니다.

use std::time::Duration;

use jarsniff_core::config::{
    CrawlSection, DEFAULT_ARCHIVE_LIST_TIMEOUT_SECS, DEFAULT_MAX_ARCHIVE_DEPTH,
    DEFAULT_MAX_CLASS_SIZE_BYTES, DEFAULT_MAX_ENTRY_SIZE_BYTES,
};
use regex::Regex;

use crate::error::CrawlError;

/// 크롤러 설정
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// 디렉토리 경로에 매칭되면 하위 탐색을 생략할 정규식
    pub ignore_dirs: Vec<Regex>,
    /// 식별기의 컨테이너 리스팅 패스와 워커의 컨테이너 엔트리 간격에 적용되는 타임아웃
    pub archive_list_timeout: Duration,
    /// 이 깊이 이상의 중첩 컨테이너는 리프로 취급
    pub max_archive_depth: usize,
    /// 재귀를 위해 메모리에 적재할 중첩 컨테이너 최대 크기
    pub max_entry_size: u64,
    /// 해시할 클래스 파일 최대 크기
    pub max_class_size: u64,
    /// CVE-2021-45105 에만 해당하는 탐지를 보고에서 제외
    pub disable_cve_2021_45105: bool,
}

impl CrawlerConfig {
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// core 설정 섹션에서 변환합니다.
    pub fn from_core(section: &CrawlSection) -> Result<Self, CrawlError> {
        Self::builder()
            .ignore_dirs(section.ignore_dirs.iter().cloned())
            .archive_list_timeout(Duration::from_secs(section.archive_list_timeout_secs))
            .max_archive_depth(section.max_archive_depth)
            .max_entry_size(section.max_entry_size_bytes)
            .max_class_size(section.max_class_size_bytes)
            .disable_cve_2021_45105(section.disable_cve_2021_45105)
            .build()
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: Vec::new(),
            archive_list_timeout: Duration::from_secs(DEFAULT_ARCHIVE_LIST_TIMEOUT_SECS),
            max_archive_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE_BYTES,
            max_class_size: DEFAULT_MAX_CLASS_SIZE_BYTES,
            disable_cve_2021_45105: false,
        }
    }
}

/// [`CrawlerConfig`] 빌더
#[derive(Debug, Clone)]
pub struct CrawlerConfigBuilder {
    ignore_dirs: Vec<String>,
    archive_list_timeout: Duration,
    max_archive_depth: usize,
    max_entry_size: u64,
    max_class_size: u64,
    disable_cve_2021_45105: bool,
}

impl CrawlerConfigBuilder {
    pub fn new() -> Self {
        let defaults = CrawlerConfig::default();
        Self {
            ignore_dirs: Vec::new(),
            archive_list_timeout: defaults.archive_list_timeout,
            max_archive_depth: defaults.max_archive_depth,
            max_entry_size: defaults.max_entry_size,
            max_class_size: defaults.max_class_size,
            disable_cve_2021_45105: defaults.disable_cve_2021_45105,
        }
    }

    pub fn ignore_dir(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_dirs.push(pattern.into());
        self
    }

    pub fn ignore_dirs<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_dirs
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// 0 이면 모든 리스팅이 즉시 타임아웃됩니다.
    pub fn archive_list_timeout(mut self, timeout: Duration) -> Self {
        self.archive_list_timeout = timeout;
        self
    }

    pub fn max_archive_depth(mut self, depth: usize) -> Self {
        self.max_archive_depth = depth;
        self
    }

    pub fn max_entry_size(mut self, bytes: u64) -> Self {
        self.max_entry_size = bytes;
        self
    }

    pub fn max_class_size(mut self, bytes: u64) -> Self {
        self.max_class_size = bytes;
        self
    }

    pub fn disable_cve_2021_45105(mut self, disable: bool) -> Self {
        self.disable_cve_2021_45105 = disable;
        self
    }

    /// 정규식을 컴파일하고 한계값을 검증합니다.
    pub fn build(self) -> Result<CrawlerConfig, CrawlError> {
        let ignore_dirs = self
            .ignore_dirs
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| CrawlError::Config {
                    field: "ignore_dirs".to_owned(),
                    reason: format!("'{pattern}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.max_archive_depth == 0 {
            return Err(CrawlError::Config {
                field: "max_archive_depth".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.max_entry_size == 0 {
            return Err(CrawlError::Config {
                field: "max_entry_size_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.max_class_size == 0 {
            return Err(CrawlError::Config {
                field: "max_class_size_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(CrawlerConfig {
            ignore_dirs,
            archive_list_timeout: self.archive_list_timeout,
            max_archive_depth: self.max_archive_depth,
            max_entry_size: self.max_entry_size,
            max_class_size: self.max_class_size,
            disable_cve_2021_45105: self.disable_cve_2021_45105,
        })
    }
}

impl Default for CrawlerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
