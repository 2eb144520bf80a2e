#![doc = include_str!("../README.md")]

pub mod archive;
pub mod config;
pub mod cve;
pub mod digests;
pub mod error;
pub mod finding;
pub mod identify;
pub mod node;
pub mod report;
pub mod stats;
pub mod version;
pub mod walker;

#[cfg(test)]
mod testutil;

// --- 주요 타입 re-export ---

pub use archive::{ContainerReader, FormatType, ReaderRegistry, detect};
pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use cve::{Cve, applicable_cves};
pub use digests::DigestTable;
pub use error::{ArchiveError, CrawlError, IdentifyError};
pub use finding::{Evidence, Finding};
pub use identify::{Identification, Identifier, Identify};
pub use node::{NodeContent, ScanNode};
pub use report::{FindingRecord, OutputMode, ReportSink, Reporter, Summary};
pub use stats::Stats;
pub use version::Log4jVersion;
pub use walker::{Collector, CrawlResult, Crawler, NodeError};
