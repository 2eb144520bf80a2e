//! Integration tests for `jarsniff config` behaviour.
//!
//! Tests config validation and display functionality with real TOML files.

use std::fs;
use tempfile::TempDir;

use jarsniff_core::config::JarsniffConfig;

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("jarsniff.toml");

    let valid_config = r#"
[general]
log_level = "info"
log_format = "json"

[crawl]
ignore_dirs = ["^/proc", "^/sys"]
archive_list_timeout_secs = 10

[output]
format = "json"
summary = false

[image]
concurrency = 4
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let config = JarsniffConfig::load(&config_path)
        .await
        .expect("valid config should load successfully");

    // Then: Values are taken from the file, the rest is defaulted
    assert_eq!(config.crawl.ignore_dirs.len(), 2);
    assert_eq!(config.crawl.archive_list_timeout_secs, 10);
    assert_eq!(config.crawl.max_archive_depth, 16);
    assert!(!config.output.summary);
    assert_eq!(config.image.concurrency, 4);
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[crawl\nignore_dirs = []\n").expect("should write bad config");

    let result = JarsniffConfig::load(&config_path).await;
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    let config_path = std::path::PathBuf::from("/nonexistent/jarsniff.toml");
    let result = JarsniffConfig::load(&config_path).await;
    assert!(result.is_err(), "missing file should fail to load");
}

#[tokio::test]
async fn test_config_validate_empty_file() {
    // An empty file is all defaults
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").expect("should write empty file");

    let config = JarsniffConfig::load(&config_path)
        .await
        .expect("empty config should load");
    assert_eq!(config.output.format, "text");
    assert!(config.output.summary);
}

#[tokio::test]
async fn test_config_rejects_invalid_ignore_regex() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("jarsniff.toml");
    fs::write(&config_path, "[crawl]\nignore_dirs = [\"(unclosed\"]\n")
        .expect("should write config");

    let err = JarsniffConfig::load(&config_path)
        .await
        .expect_err("invalid regex should be rejected");
    assert!(err.to_string().contains("crawl.ignore_dirs"));
}

#[tokio::test]
async fn test_config_rejects_zero_concurrency() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("jarsniff.toml");
    fs::write(&config_path, "[image]\nconcurrency = 0\n").expect("should write config");

    let err = JarsniffConfig::load(&config_path)
        .await
        .expect_err("zero concurrency should be rejected");
    assert!(err.to_string().contains("image.concurrency"));
}

#[tokio::test]
async fn test_config_show_round_trips_through_toml() {
    let config = JarsniffConfig::default();
    let rendered = toml::to_string_pretty(&config).expect("should serialize");
    let parsed = JarsniffConfig::parse(&rendered).expect("rendered config should parse");
    parsed.validate().expect("rendered config should validate");
    assert_eq!(
        parsed.crawl.max_entry_size_bytes,
        config.crawl.max_entry_size_bytes
    );
}

#[tokio::test]
async fn test_config_special_characters_in_ignore_dirs() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("jarsniff.toml");
    fs::write(
        &config_path,
        "[crawl]\nignore_dirs = ['^/var/lib/docker/overlay2/[0-9a-f]{64}', '\\.snapshot$']\n",
    )
    .expect("should write config");

    let config = JarsniffConfig::load(&config_path)
        .await
        .expect("regex with special characters should load");
    assert_eq!(config.crawl.ignore_dirs[1], "\\.snapshot$");
}
