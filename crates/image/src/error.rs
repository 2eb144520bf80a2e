//! 이미지 스캔 에러 타입

use jarsniff_core::error::JarsniffError;
use jarsniff_crawler::CrawlError;

use crate::scanner::ImageScanSummary;

/// 이미지 스캔 에러
#[derive(Debug, thiserror::Error)]
pub enum ImageScanError {
    /// Docker 데몬 연결 실패
    #[error("docker connection error: {0}")]
    DockerConnection(String),

    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// 이미지 파일 시스템 추출 실패
    #[error("failed to export image {image}: {reason}")]
    Export { image: String, reason: String },

    /// 요청한 이미지를 찾을 수 없음
    #[error("image not found: {0}")]
    NotFound(String),

    /// 추출된 파일 시스템 크롤 실패
    #[error("crawl error: {0}")]
    Crawl(#[from] CrawlError),

    /// 작업 태스크 실패 (panic, join)
    #[error("scan task failed: {0}")]
    Task(String),

    /// 취소 신호 수신. 그때까지 합쳐진 결과를 함께 돌려줍니다.
    #[error("image scan cancelled after {} images", partial.scanned)]
    Cancelled { partial: Box<ImageScanSummary> },

    /// 임시 디렉토리, 추출 파일 I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ImageScanError> for JarsniffError {
    fn from(err: ImageScanError) -> Self {
        match err {
            ImageScanError::Crawl(crawl) => crawl.into(),
            other => JarsniffError::Image(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_display_names_image() {
        let err = ImageScanError::Export {
            image: "sha256:abc".to_owned(),
            reason: "stream closed".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "failed to export image sha256:abc: stream closed"
        );
    }

    #[test]
    fn crawl_config_error_keeps_config_kind() {
        let err: JarsniffError = ImageScanError::Crawl(CrawlError::Config {
            field: "ignore_dirs".to_owned(),
            reason: "bad regex".to_owned(),
        })
        .into();
        assert!(matches!(err, JarsniffError::Config(_)));
    }

    #[test]
    fn docker_errors_convert_to_image_error() {
        let err: JarsniffError = ImageScanError::DockerConnection("refused".to_owned()).into();
        assert!(matches!(err, JarsniffError::Image(_)));
    }
}
