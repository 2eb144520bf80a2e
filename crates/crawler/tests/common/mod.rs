//! Shared fixture builders for crawler integration tests

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use jarsniff_crawler::{
    CrawlResult, Crawler, CrawlerConfig, DigestTable, Identifier, Log4jVersion, OutputMode,
    ReaderRegistry, ReportSink, Reporter,
};
use semver::Version;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;

pub const JNDI_MANAGER_PATH: &str = "org/apache/logging/log4j/core/net/JndiManager.class";

/// Stand-in class bytes whose digest the test identifier knows
pub const KNOWN_CLASS: &[u8] = b"\xca\xfe\xba\xbe\x00\x00\x00\x34 JndiManager 2.15.0";

pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Zip with stored (uncompressed) entries, so entry payloads appear verbatim
pub fn stored_zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Flip the first byte of `marker` so the entry fails its CRC check when read
pub fn corrupt_first(bytes: &mut [u8], marker: &[u8]) {
    let at = bytes
        .windows(marker.len())
        .position(|window| window == marker)
        .expect("marker present in archive");
    bytes[at] ^= 0xff;
}

pub fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_639_000_000);
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn write_file(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Digest table containing only [`KNOWN_CLASS`]
pub fn test_digests() -> DigestTable {
    let mut table = DigestTable::empty();
    table.insert(
        jarsniff_crawler::digests::md5_hex(KNOWN_CLASS),
        Log4jVersion::exact(Version::new(2, 15, 0)),
    );
    table
}

pub fn crawler(config: CrawlerConfig) -> Crawler {
    let readers = Arc::new(ReaderRegistry::default());
    let identifier = Identifier::new(&config, Arc::clone(&readers))
        .unwrap()
        .with_digests(test_digests());
    Crawler::with_identifier(config, identifier, readers)
}

/// In-memory report sink that can be inspected after the crawl
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    /// Parsed JSON records, one per line
    pub fn records(&self) -> Vec<serde_json::Value> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

/// Crawl `root` with a JSON reporter and return the result plus emitted records
pub fn crawl_json(
    root: &Path,
    config: CrawlerConfig,
) -> (CrawlResult, Vec<serde_json::Value>) {
    let disable = config.disable_cve_2021_45105;
    let buffer = SharedBuffer::default();
    let mut reporter = Reporter::new(OutputMode::Json, ReportSink::new(buffer.clone()), disable);
    let result = crawler(config)
        .crawl(root, &mut reporter, &CancellationToken::new())
        .unwrap();
    (result, buffer.records())
}

/// Find the record whose path ends with `suffix`
pub fn record_for<'a>(records: &'a [serde_json::Value], suffix: &str) -> &'a serde_json::Value {
    records
        .iter()
        .find(|r| r["path"].as_str().is_some_and(|p| p.ends_with(suffix)))
        .unwrap_or_else(|| panic!("no record ending with {suffix}: {records:#?}"))
}
