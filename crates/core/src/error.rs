//! 에러 타입 — 도메인별 에러 정의

/// jarsniff 최상위 에러 타입
///
/// 각 크레이트의 에러는 `From` 구현으로 이 타입으로 변환됩니다.
#[derive(Debug, thiserror::Error)]
pub enum JarsniffError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 크롤링 에러 (루트 접근 실패, 취소 등)
    #[error("crawl error: {0}")]
    Crawl(String),

    /// 컨테이너 이미지 스캔 에러
    #[error("image scan error: {0}")]
    Image(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
