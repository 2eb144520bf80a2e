//! jarsniff.toml 통합 설정 테스트
//!
//! - jarsniff.toml.example 파싱 테스트
//! - 파일 로딩 + 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use jarsniff_core::config::JarsniffConfig;
use jarsniff_core::error::{ConfigError, JarsniffError};
use serial_test::serial;

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../jarsniff.toml.example");
    let config = JarsniffConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.crawl.ignore_dirs, vec!["^/proc", "^/sys", "^/dev"]);
    assert_eq!(config.crawl.archive_list_timeout_secs, 5);
    assert_eq!(config.image.concurrency, 2);
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../jarsniff.toml.example");
    let config = JarsniffConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[tokio::test]
#[serial]
async fn load_applies_env_overrides_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jarsniff.toml");
    std::fs::write(
        &path,
        "[crawl]\narchive_list_timeout_secs = 3\n[output]\nformat = \"text\"\n",
    )
    .unwrap();

    // SAFETY: #[serial] 로 환경변수를 사용하는 테스트끼리 동시에 실행되지 않습니다.
    unsafe {
        std::env::set_var("JARSNIFF_CRAWL_ARCHIVE_LIST_TIMEOUT_SECS", "9");
        std::env::set_var("JARSNIFF_OUTPUT_FORMAT", "json");
    }
    let config = JarsniffConfig::load(&path).await;
    unsafe {
        std::env::remove_var("JARSNIFF_CRAWL_ARCHIVE_LIST_TIMEOUT_SECS");
        std::env::remove_var("JARSNIFF_OUTPUT_FORMAT");
    }

    let config = config.expect("config should load");
    assert_eq!(config.crawl.archive_list_timeout_secs, 9);
    assert_eq!(config.output.format, "json");
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_env_value_after_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jarsniff.toml");
    std::fs::write(&path, "").unwrap();

    // SAFETY: #[serial] 로 환경변수를 사용하는 테스트끼리 동시에 실행되지 않습니다.
    unsafe { std::env::set_var("JARSNIFF_GENERAL_LOG_LEVEL", "loud") };
    let result = JarsniffConfig::load(&path).await;
    unsafe { std::env::remove_var("JARSNIFF_GENERAL_LOG_LEVEL") };

    assert!(matches!(
        result,
        Err(JarsniffError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[tokio::test]
async fn load_reports_parse_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[crawl\n").unwrap();

    let result = JarsniffConfig::load(&path).await;
    assert!(matches!(
        result,
        Err(JarsniffError::Config(ConfigError::ParseFailed { .. }))
    ));
}
