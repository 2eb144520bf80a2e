//! CLI-specific error types and exit code mapping

use jarsniff_core::error::JarsniffError;
use jarsniff_crawler::CrawlError;
use jarsniff_image::ImageScanError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Cannot reach the Docker daemon.
    #[error("docker not reachable: {0}")]
    DockerUnavailable(String),

    /// The scan completed and reported vulnerable files.
    #[error("found {0} vulnerable files")]
    VulnerableFound(u64),

    /// The scan was interrupted by a signal.
    #[error("scan cancelled")]
    Cancelled,

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from jarsniff-core.
    #[error("{0}")]
    Core(#[from] JarsniffError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success, nothing found           |
    /// | 1    | General / command error          |
    /// | 2    | Configuration error              |
    /// | 3    | Docker unreachable               |
    /// | 4    | Vulnerable files found           |
    /// | 10   | IO error                         |
    /// | 130  | Cancelled by signal              |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(JarsniffError::Config(_)) => 2,
            Self::DockerUnavailable(_) => 3,
            Self::VulnerableFound(_) => 4,
            Self::Io(_) | Self::Core(JarsniffError::Io(_)) => 10,
            Self::Cancelled => 130,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<CrawlError> for CliError {
    fn from(e: CrawlError) -> Self {
        match e {
            CrawlError::Cancelled { .. } => Self::Cancelled,
            CrawlError::Config { .. } => Self::Config(e.to_string()),
            CrawlError::RootInaccessible { .. } => Self::Command(e.to_string()),
        }
    }
}

impl From<ImageScanError> for CliError {
    fn from(e: ImageScanError) -> Self {
        match e {
            ImageScanError::DockerConnection(_) | ImageScanError::DockerApi(_) => {
                Self::DockerUnavailable(e.to_string())
            }
            ImageScanError::Cancelled { .. } => Self::Cancelled,
            ImageScanError::Crawl(crawl) => crawl.into(),
            ImageScanError::Io(io) => Self::Io(io),
            other => Self::Command(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_core_config_error() {
        let err = CliError::Core(JarsniffError::Config(
            jarsniff_core::error::ConfigError::ParseFailed {
                reason: "bad".to_owned(),
            },
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_vulnerable_found() {
        let err = CliError::VulnerableFound(3);
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.to_string(), "found 3 vulnerable files");
    }

    #[test]
    fn test_exit_code_docker_and_cancel() {
        assert_eq!(CliError::DockerUnavailable("refused".to_owned()).exit_code(), 3);
        assert_eq!(CliError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert_eq!(CliError::Io(io_err).exit_code(), 10);
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("test error".to_owned());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "test error");
    }

    #[test]
    fn test_from_crawl_cancelled() {
        let err: CliError = CrawlError::Cancelled {
            partial: Box::default(),
        }
        .into();
        assert!(matches!(err, CliError::Cancelled));
    }

    #[test]
    fn test_from_crawl_root_inaccessible() {
        let err: CliError = CrawlError::RootInaccessible {
            path: "/missing".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("/missing"));
    }

    #[test]
    fn test_from_image_docker_error() {
        let err: CliError = ImageScanError::DockerApi("list images failed".to_owned()).into();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_from_image_crawl_config_error() {
        let err: CliError = ImageScanError::Crawl(CrawlError::Config {
            field: "ignore_dirs".to_owned(),
            reason: "bad".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 2);
    }
}
