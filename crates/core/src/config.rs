//! 설정 관리 — jarsniff.toml 파싱 및 런타임 설정
//!
//! [`JarsniffConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//! 크롤러 코어는 이 구조체를 직접 읽지 않고, 호출자가 변환한 값만 입력으로 받습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`JARSNIFF_CRAWL_ARCHIVE_LIST_TIMEOUT_SECS=10` 형식)
//! 3. 설정 파일 (`jarsniff.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), jarsniff_core::error::JarsniffError> {
//! use jarsniff_core::config::JarsniffConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = JarsniffConfig::load("jarsniff.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = JarsniffConfig::parse("[crawl]\ndisable_cve_2021_45105 = true")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, JarsniffError};

/// 아카이브 리스팅 타임아웃 기본값 (초)
pub const DEFAULT_ARCHIVE_LIST_TIMEOUT_SECS: u64 = 5;

/// 중첩 아카이브 최대 깊이 기본값
pub const DEFAULT_MAX_ARCHIVE_DEPTH: usize = 16;

/// 재귀를 위해 메모리에 적재할 중첩 컨테이너 최대 크기 기본값 (256 MiB)
pub const DEFAULT_MAX_ENTRY_SIZE_BYTES: u64 = 256 * 1024 * 1024;

/// 해시 계산을 위해 읽을 클래스 파일 최대 크기 기본값 (1 MiB)
pub const DEFAULT_MAX_CLASS_SIZE_BYTES: u64 = 1024 * 1024;

/// jarsniff 통합 설정
///
/// `jarsniff.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JarsniffConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 크롤링 설정
    #[serde(default)]
    pub crawl: CrawlSection,
    /// 출력 설정
    #[serde(default)]
    pub output: OutputSection,
    /// 컨테이너 이미지 스캔 설정
    #[serde(default)]
    pub image: ImageSection,
}

impl JarsniffConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, JarsniffError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, JarsniffError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                JarsniffError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                JarsniffError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, JarsniffError> {
        toml::from_str(toml_str).map_err(|e| {
            JarsniffError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `JARSNIFF_{SECTION}_{FIELD}`
    /// 예: `JARSNIFF_CRAWL_IGNORE_DIRS=^/proc,^/sys`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "JARSNIFF_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "JARSNIFF_GENERAL_LOG_FORMAT");

        // Crawl
        override_csv(&mut self.crawl.ignore_dirs, "JARSNIFF_CRAWL_IGNORE_DIRS");
        override_u64(
            &mut self.crawl.archive_list_timeout_secs,
            "JARSNIFF_CRAWL_ARCHIVE_LIST_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.crawl.max_archive_depth,
            "JARSNIFF_CRAWL_MAX_ARCHIVE_DEPTH",
        );
        override_u64(
            &mut self.crawl.max_entry_size_bytes,
            "JARSNIFF_CRAWL_MAX_ENTRY_SIZE_BYTES",
        );
        override_u64(
            &mut self.crawl.max_class_size_bytes,
            "JARSNIFF_CRAWL_MAX_CLASS_SIZE_BYTES",
        );
        override_bool(
            &mut self.crawl.disable_cve_2021_45105,
            "JARSNIFF_CRAWL_DISABLE_CVE_2021_45105",
        );

        // Output
        override_string(&mut self.output.format, "JARSNIFF_OUTPUT_FORMAT");
        override_bool(&mut self.output.summary, "JARSNIFF_OUTPUT_SUMMARY");

        // Image
        override_string(&mut self.image.docker_socket, "JARSNIFF_IMAGE_DOCKER_SOCKET");
        override_usize(&mut self.image.concurrency, "JARSNIFF_IMAGE_CONCURRENCY");
        override_bool(
            &mut self.image.include_untagged,
            "JARSNIFF_IMAGE_INCLUDE_UNTAGGED",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), JarsniffError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // ignore_dirs 는 정규식이어야 함
        for pattern in &self.crawl.ignore_dirs {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::InvalidValue {
                    field: "crawl.ignore_dirs".to_owned(),
                    reason: format!("invalid pattern '{pattern}': {e}"),
                }
                .into());
            }
        }

        if self.crawl.archive_list_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crawl.archive_list_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.crawl.max_archive_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crawl.max_archive_depth".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.crawl.max_class_size_bytes == 0 || self.crawl.max_entry_size_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crawl.max_*_size_bytes".to_owned(),
                reason: "size limits must be greater than 0".to_owned(),
            }
            .into());
        }

        // output.format 검증
        let valid_outputs = ["text", "json"];
        if !valid_outputs.contains(&self.output.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "output.format".to_owned(),
                reason: format!("must be one of: {}", valid_outputs.join(", ")),
            }
            .into());
        }

        if self.image.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "image.concurrency".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 크롤링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSection {
    /// 디렉토리 경로에 매칭되면 하위 탐색을 생략할 정규식 목록
    pub ignore_dirs: Vec<String>,
    /// 컨테이너 하나를 여는 리스팅 패스의 타임아웃 (초)
    pub archive_list_timeout_secs: u64,
    /// 중첩 아카이브 최대 깊이
    pub max_archive_depth: usize,
    /// 재귀를 위해 메모리에 적재할 중첩 컨테이너 최대 크기 (바이트)
    pub max_entry_size_bytes: u64,
    /// 해시를 계산할 클래스 파일 최대 크기 (바이트)
    pub max_class_size_bytes: u64,
    /// CVE-2021-45105 에만 해당하는 탐지를 집계에서 제외
    pub disable_cve_2021_45105: bool,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            ignore_dirs: Vec::new(),
            archive_list_timeout_secs: DEFAULT_ARCHIVE_LIST_TIMEOUT_SECS,
            max_archive_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
            max_entry_size_bytes: DEFAULT_MAX_ENTRY_SIZE_BYTES,
            max_class_size_bytes: DEFAULT_MAX_CLASS_SIZE_BYTES,
            disable_cve_2021_45105: false,
        }
    }
}

/// 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// 출력 형식 (text, json)
    pub format: String,
    /// 스캔 종료 후 요약 출력 여부
    pub summary: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format: "text".to_owned(),
            summary: true,
        }
    }
}

/// 컨테이너 이미지 스캔 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSection {
    /// Docker 소켓 경로 (빈 문자열이면 플랫폼 기본값)
    pub docker_socket: String,
    /// 동시에 스캔할 이미지 수
    pub concurrency: usize,
    /// 태그가 없는 이미지도 스캔
    pub include_untagged: bool,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            docker_socket: String::new(),
            concurrency: 2,
            include_untagged: false,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
