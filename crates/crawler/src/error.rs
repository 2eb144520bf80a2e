//! 크롤러 에러 타입
//!
//! [`CrawlError`]는 루트 단위 치명적 에러만 담습니다. 노드 하나에 국한된 에러는
//! [`ArchiveError`] 또는 [`IdentifyError`]로 표현되며 워커 밖으로 전파되지 않고
//! [`NodeError`](crate::walker::NodeError)로 에러 싱크에 기록됩니다.

use jarsniff_core::error::JarsniffError;

use crate::archive::FormatType;
use crate::walker::CrawlResult;

/// 크롤 호출 전체를 중단시키는 에러
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// 크롤 루트에 접근할 수 없음 (권한, 존재하지 않음)
    #[error("crawl root inaccessible: {path}: {source}")]
    RootInaccessible {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 취소 신호 수신. 그때까지 채워진 결과를 함께 돌려줍니다.
    #[error("crawl cancelled after {} files", partial.stats.files_scanned)]
    Cancelled { partial: Box<CrawlResult> },

    /// 크롤러 설정 오류
    #[error("invalid crawler config '{field}': {reason}")]
    Config { field: String, reason: String },
}

/// 컨테이너 하나를 읽는 동안 발생하는 에러
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// 손상되었거나 잘린 컨테이너
    #[error("corrupt {format} container: {reason}")]
    Corrupt { format: FormatType, reason: String },

    /// 등록된 리더가 없는 포맷
    #[error("no container reader registered for {format}")]
    Unsupported { format: FormatType },

    /// 스트림으로만 읽을 수 있어 컨테이너로 열 수 없는 노드
    #[error("container content is not available for random access")]
    SourceUnavailable,

    /// 재귀를 위해 메모리에 적재하기에 너무 큰 중첩 컨테이너
    #[error("nested container too large: {size} bytes (max: {limit})")]
    TooLarge { size: u64, limit: u64 },

    /// 컨테이너별 리스팅 타임아웃 초과
    #[error("archive listing timed out")]
    Timeout,

    /// 크롤 취소
    #[error("archive listing cancelled")]
    Cancelled,

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 노드 하나를 식별하는 동안 발생하는 에러
#[derive(Debug, thiserror::Error)]
pub enum IdentifyError {
    /// 노드 내용 읽기 실패
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<CrawlError> for JarsniffError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Config { field, reason } => {
                JarsniffError::Config(jarsniff_core::error::ConfigError::InvalidValue {
                    field,
                    reason,
                })
            }
            other => JarsniffError::Crawl(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_inaccessible_display_includes_path() {
        let err = CrawlError::RootInaccessible {
            path: "/srv/missing".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/srv/missing"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn cancelled_display_reports_progress() {
        let mut partial = CrawlResult::default();
        partial.stats.files_scanned = 7;
        let err = CrawlError::Cancelled {
            partial: Box::new(partial),
        };
        assert_eq!(err.to_string(), "crawl cancelled after 7 files");
    }

    #[test]
    fn corrupt_display_names_format() {
        let err = ArchiveError::Corrupt {
            format: FormatType::TarGz,
            reason: "invalid gzip header".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt tar.gz container: invalid gzip header"
        );
    }

    #[test]
    fn config_error_converts_to_core_config_error() {
        let err: JarsniffError = CrawlError::Config {
            field: "ignore_dirs".to_owned(),
            reason: "bad regex".to_owned(),
        }
        .into();
        assert!(matches!(err, JarsniffError::Config(_)));
    }

    #[test]
    fn root_error_converts_to_core_crawl_error() {
        let err: JarsniffError = CrawlError::RootInaccessible {
            path: "/x".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert!(matches!(err, JarsniffError::Crawl(_)));
    }
}
