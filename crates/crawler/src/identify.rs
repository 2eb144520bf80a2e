//! 노드 하나의 취약 증거 식별
//!
//! 네 가지 신호를 독립적으로 계산하고 합칩니다.
//!
//! 1. 파일명: 기본 이름이 `log4j-core-<version>.jar` 이고 버전이 영향 범위면 `JarName`
//! 2. 클래스: 실제 파일이 `JndiManager.class` 이면 `ClassName` 또는 `ClassPackageAndName`,
//!    내용 MD5 가 알려진 다이제스트면 `ClassFileMd5`
//! 3. 리스팅: 컨테이너 노드는 엔트리를 한 번 훑어 중첩 파일명(`JarNameInsideArchive`)과
//!    클래스 엔트리(2번과 같은 규칙)를 확인
//! 4. 버전: 다이제스트 > 파일명 > 중첩 파일명 순으로 우선
//!
//! 컨테이너 안의 클래스 엔트리는 그 컨테이너의 리스팅에서 이미 집계되므로, 중첩 노드에
//! 대해서는 클래스 신호를 다시 계산하지 않습니다.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use jarsniff_core::metrics::{CRAWLER_LISTING_TIMEOUTS_TOTAL, LABEL_FORMAT};

use crate::archive::{
    ArchiveEntry, Deadline, FormatType, ReaderRegistry, WalkControl, detect,
};
use crate::config::CrawlerConfig;
use crate::cve::Cve;
use crate::digests::DigestTable;
use crate::error::{ArchiveError, CrawlError, IdentifyError};
use crate::finding::{Evidence, Finding};
use crate::node::{ScanNode, base_name};
use crate::version::{JarNamePattern, Log4jVersion};

/// 대상 클래스의 패키지 경로
pub const TARGET_CLASS_PATH: &str = "org/apache/logging/log4j/core/net/JndiManager.class";

/// 대상 클래스의 단순 이름
pub const TARGET_CLASS_NAME: &str = "JndiManager.class";

/// 애플리케이션 클래스가 놓이는 컨테이너 내부 루트 (Spring Boot, 서블릿 war)
const CLASSPATH_ROOTS: [&str; 2] = ["BOOT-INF/classes/", "WEB-INF/classes/"];

/// 식별 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identification {
    pub finding: Finding,
    pub version: Option<Log4jVersion>,
}

impl Identification {
    pub fn cves(&self) -> Vec<Cve> {
        crate::cve::applicable_cves(&self.finding, self.version.as_ref())
    }
}

/// 노드 식별기
///
/// 워커는 이 트레이트로만 식별기를 호출하므로 테스트에서 다른 구현을 끼울 수 있습니다.
pub trait Identify {
    fn identify(
        &self,
        node: &ScanNode<'_>,
        cancel: &CancellationToken,
    ) -> Result<Identification, IdentifyError>;
}

/// 컨테이너 안 엔트리 이름이 대상 패키지 경로와 일치하는지 확인합니다.
fn matches_package_in_container(entry_name: &str) -> bool {
    let name = entry_name
        .strip_prefix("./")
        .or_else(|| entry_name.strip_prefix('/'))
        .unwrap_or(entry_name);
    name == TARGET_CLASS_PATH
        || CLASSPATH_ROOTS.iter().any(|root| {
            name.strip_prefix(root)
                .is_some_and(|rest| rest == TARGET_CLASS_PATH)
        })
}

/// 실제 파일 경로가 대상 패키지 경로로 끝나는지 확인합니다.
fn matches_package_on_disk(path: &str) -> bool {
    let path = path.replace('\\', "/");
    path == TARGET_CLASS_PATH || path.ends_with(&format!("/{TARGET_CLASS_PATH}"))
}

/// 같은 컨테이너에서 여러 버전이 보이면 기본 CVE 범위에 걸치는 쪽을 남깁니다.
fn keep_stronger(slot: &mut Option<Log4jVersion>, candidate: Option<Log4jVersion>) {
    if let Some(candidate) = candidate {
        *slot = Some(match slot.take() {
            Some(current) => current.stronger(candidate),
            None => candidate,
        });
    }
}

/// 리스팅 패스 결과
#[derive(Default)]
struct Listing {
    finding: Finding,
    digest_version: Option<Log4jVersion>,
    nested_version: Option<Log4jVersion>,
}

/// 기본 식별기
pub struct Identifier {
    jar_pattern: JarNamePattern,
    digests: DigestTable,
    readers: Arc<ReaderRegistry>,
    listing_timeout: Duration,
    max_class_size: u64,
}

impl Identifier {
    pub fn new(config: &CrawlerConfig, readers: Arc<ReaderRegistry>) -> Result<Self, CrawlError> {
        let jar_pattern = JarNamePattern::log4j_core().map_err(|e| CrawlError::Config {
            field: "jar_pattern".to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            jar_pattern,
            digests: DigestTable::known_jndi_manager(),
            readers,
            listing_timeout: config.archive_list_timeout,
            max_class_size: config.max_class_size,
        })
    }

    /// 다이제스트 테이블을 교체합니다.
    pub fn with_digests(mut self, digests: DigestTable) -> Self {
        self.digests = digests;
        self
    }

    /// 파일명 버전과, 영향 범위일 때만 세우는 플래그
    fn name_evidence(&self, base: &str, flag: Evidence) -> (Finding, Option<Log4jVersion>) {
        match self.jar_pattern.parse(base) {
            Some(version) if version.affected_by(Cve::Cve2021_45105) => {
                (Finding::NONE.with(flag), Some(version))
            }
            Some(version) => (Finding::NONE, Some(version)),
            None => (Finding::NONE, None),
        }
    }

    /// 클래스 내용을 해시해 다이제스트 테이블과 비교합니다.
    fn digest_evidence(&self, content: Option<Vec<u8>>) -> (Finding, Option<Log4jVersion>) {
        match content.as_deref().and_then(|bytes| self.digests.lookup_content(bytes)) {
            Some(version) => (
                Finding::NONE.with(Evidence::ClassFileMd5),
                Some(version.clone()),
            ),
            None => (Finding::NONE, None),
        }
    }

    fn inspect_loose_class(
        &self,
        node: &ScanNode<'_>,
    ) -> Result<(Finding, Option<Log4jVersion>), IdentifyError> {
        let mut finding = if matches_package_on_disk(node.name) {
            Finding::NONE.with(Evidence::ClassPackageAndName)
        } else {
            Finding::NONE.with(Evidence::ClassName)
        };
        let content = node
            .content
            .read_limited(self.max_class_size)
            .map_err(|source| IdentifyError::Read {
                path: node.path.clone(),
                source,
            })?;
        if content.is_none() {
            debug!(path = %node.path, "class file exceeds size limit, skipping digest");
        }
        let (digest, version) = self.digest_evidence(content);
        finding |= digest;
        Ok((finding, version))
    }

    /// 컨테이너 안 클래스 엔트리. 내용을 읽지 못하면 이름 신호만 남깁니다.
    fn inspect_class_entry(
        &self,
        container: &str,
        entry: &mut ArchiveEntry<'_>,
    ) -> (Finding, Option<Log4jVersion>) {
        let mut finding = if matches_package_in_container(entry.name) {
            Finding::NONE.with(Evidence::ClassPackageAndName)
        } else {
            Finding::NONE.with(Evidence::ClassName)
        };
        let mut buf = Vec::new();
        if let Err(e) = (&mut *entry.reader)
            .take(self.max_class_size.saturating_add(1))
            .read_to_end(&mut buf)
        {
            debug!(
                path = %container,
                entry = entry.name,
                error = %e,
                "failed to read class entry, skipping digest"
            );
            return (finding, None);
        }
        let content = (buf.len() as u64 <= self.max_class_size).then_some(buf);
        let (digest, version) = self.digest_evidence(content);
        finding |= digest;
        (finding, version)
    }

    /// 컨테이너 엔트리를 한 번 훑는 리스팅 패스
    fn list_container(
        &self,
        node: &ScanNode<'_>,
        format: FormatType,
        cancel: &CancellationToken,
    ) -> Result<Listing, ArchiveError> {
        let reader = self
            .readers
            .get(format)
            .ok_or(ArchiveError::Unsupported { format })?;
        let source = node
            .content
            .open_seekable()?
            .ok_or(ArchiveError::SourceUnavailable)?;
        let deadline = Deadline::after(self.listing_timeout, cancel);

        let mut listing = Listing::default();
        reader.walk(
            source,
            &deadline,
            &mut |mut entry: ArchiveEntry<'_>| -> Result<WalkControl, ArchiveError> {
                let base = base_name(entry.name);
                let (nested, version) = self.name_evidence(base, Evidence::JarNameInsideArchive);
                if !nested.is_empty() {
                    listing.finding |= nested;
                    keep_stronger(&mut listing.nested_version, version);
                }
                if base == TARGET_CLASS_NAME {
                    let (class, version) = self.inspect_class_entry(&node.path, &mut entry);
                    listing.finding |= class;
                    keep_stronger(&mut listing.digest_version, version);
                }
                Ok(WalkControl::Continue)
            },
        )?;
        Ok(listing)
    }
}

impl Identify for Identifier {
    fn identify(
        &self,
        node: &ScanNode<'_>,
        cancel: &CancellationToken,
    ) -> Result<Identification, IdentifyError> {
        let base = node.base_name();
        let (mut finding, name_version) = self.name_evidence(base, Evidence::JarName);
        let mut digest_version = None;
        let mut nested_version = None;

        if !node.is_nested() && base == TARGET_CLASS_NAME {
            let (class, version) = self.inspect_loose_class(node)?;
            finding |= class;
            digest_version = version;
        }

        let (format, _) = detect(node.name);
        if format.is_container() {
            match self.list_container(node, format, cancel) {
                Ok(listing) => {
                    finding |= listing.finding;
                    digest_version = digest_version.or(listing.digest_version);
                    nested_version = listing.nested_version;
                }
                Err(ArchiveError::Timeout) => {
                    warn!(
                        path = %node.path,
                        timeout_ms = self.listing_timeout.as_millis() as u64,
                        "archive listing timed out, skipping container-level evidence"
                    );
                    counter!(CRAWLER_LISTING_TIMEOUTS_TOTAL, LABEL_FORMAT => format.as_str())
                        .increment(1);
                }
                Err(e) => {
                    // 손상 컨테이너는 워커가 하위 탐색 중에 다시 만나 에러 싱크에 기록함
                    debug!(path = %node.path, error = %e, "archive listing failed");
                }
            }
        }

        Ok(Identification {
            finding,
            version: digest_version.or(name_version).or(nested_version),
        })
    }
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use super::*;
    use crate::digests::md5_hex;
    use crate::node::NodeContent;
    use crate::testutil::{corrupt_first, gzip_bytes, stored_zip_bytes, tar_bytes, zip_bytes};

    const FAKE_CLASS: &[u8] = b"\xca\xfe\xba\xbe fake JndiManager";

    fn identifier() -> Identifier {
        Identifier::new(&CrawlerConfig::default(), Arc::new(ReaderRegistry::default()))
            .unwrap()
            .with_digests(digests())
    }

    fn digests() -> DigestTable {
        let mut table = DigestTable::empty();
        table.insert(
            md5_hex(FAKE_CLASS),
            Log4jVersion::range(Version::new(2, 14, 0), Version::new(2, 14, 1)),
        );
        table
    }

    fn memory_node<'a>(name: &'a str, bytes: &'a [u8], depth: usize) -> ScanNode<'a> {
        ScanNode {
            path: name.to_owned(),
            name,
            size: bytes.len() as u64,
            modified: None,
            depth,
            content: NodeContent::Memory(bytes),
        }
    }

    fn run(node: &ScanNode<'_>) -> Identification {
        identifier()
            .identify(node, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn jar_name_with_version() {
        let id = run(&memory_node("lib/log4j-core-2.14.1.jar", b"", 0));
        assert_eq!(id.finding, Finding::NONE.with(Evidence::JarName));
        assert_eq!(id.version.unwrap().to_string(), "2.14.1");
    }

    #[test]
    fn patched_jar_name_records_version_without_flag() {
        let id = run(&memory_node("log4j-core-2.17.1.jar", b"", 0));
        assert!(id.finding.is_empty());
        assert_eq!(id.version.unwrap().to_string(), "2.17.1");
    }

    #[test]
    fn nested_jar_name_sets_inside_archive_flag() {
        let war = zip_bytes(&[
            ("WEB-INF/web.xml", b"<web-app/>"),
            ("WEB-INF/lib/log4j-core-2.15.0.jar", b"inner"),
        ]);
        let id = run(&memory_node("app.war", &war, 0));
        assert!(id.finding.contains(Evidence::JarNameInsideArchive));
        assert!(!id.finding.contains(Evidence::JarName));
        assert_eq!(id.version.unwrap().to_string(), "2.15.0");
    }

    #[test]
    fn nested_versions_keep_the_base_cve_match() {
        let war = zip_bytes(&[
            ("WEB-INF/lib/log4j-core-2.16.0.jar", b"a"),
            ("WEB-INF/lib/log4j-core-2.14.1.jar", b"b"),
        ]);
        let id = run(&memory_node("app.war", &war, 0));
        assert_eq!(id.version.as_ref().unwrap().to_string(), "2.14.1");
        assert_eq!(id.cves(), vec![Cve::Cve2021_45046, Cve::Cve2021_45105]);

        let narrow_only = zip_bytes(&[
            ("WEB-INF/lib/log4j-core-2.16.0.jar", b"a"),
            ("WEB-INF/lib/log4j-core-2.12.2.jar", b"b"),
        ]);
        let id = run(&memory_node("app.war", &narrow_only, 0));
        assert_eq!(id.version.unwrap().to_string(), "2.16.0");
    }

    #[test]
    fn unreadable_class_entry_keeps_rest_of_listing() {
        let mut jar = stored_zip_bytes(&[
            (TARGET_CLASS_PATH, FAKE_CLASS),
            ("lib/log4j-core-2.14.1.jar", b"x"),
        ]);
        corrupt_first(&mut jar, b"fake JndiManager");
        let id = run(&memory_node("bundle.zip", &jar, 0));
        assert!(id.finding.contains(Evidence::ClassPackageAndName));
        assert!(id.finding.contains(Evidence::JarNameInsideArchive));
        assert!(!id.finding.contains(Evidence::ClassFileMd5));
        assert_eq!(id.version.unwrap().to_string(), "2.14.1");
    }

    #[test]
    fn own_jar_name_suppresses_inside_archive_flag() {
        let jar = zip_bytes(&[("lib/log4j-core-2.14.1.jar", b"x")]);
        let id = run(&memory_node("log4j-core-2.12.1.jar", &jar, 0));
        assert_eq!(id.finding, Finding::NONE.with(Evidence::JarName));
        assert_eq!(id.version.unwrap().to_string(), "2.12.1");
    }

    #[test]
    fn package_path_class_with_known_digest() {
        let jar = zip_bytes(&[(TARGET_CLASS_PATH, FAKE_CLASS)]);
        let id = run(&memory_node("shaded-app.jar", &jar, 0));
        assert!(id.finding.contains(Evidence::ClassPackageAndName));
        assert!(!id.finding.contains(Evidence::ClassName));
        assert!(id.finding.contains(Evidence::ClassFileMd5));
        assert!(id.finding.is_consistent());
        assert_eq!(id.version.unwrap().to_string(), "2.14.0 - 2.14.1");
    }

    #[test]
    fn changing_one_byte_removes_digest_flag() {
        let mut tampered = FAKE_CLASS.to_vec();
        tampered[0] ^= 0x01;
        let jar = zip_bytes(&[(TARGET_CLASS_PATH, tampered.as_slice())]);
        let id = run(&memory_node("app.jar", &jar, 0));
        assert!(id.finding.contains(Evidence::ClassPackageAndName));
        assert!(!id.finding.contains(Evidence::ClassFileMd5));
        assert!(id.version.is_none());
    }

    #[test]
    fn relocated_class_is_name_only() {
        let jar = zip_bytes(&[("shaded/log4j/core/net/JndiManager.class", FAKE_CLASS)]);
        let id = run(&memory_node("fat.jar", &jar, 0));
        assert!(id.finding.contains(Evidence::ClassName));
        assert!(!id.finding.contains(Evidence::ClassPackageAndName));
        assert!(id.finding.contains(Evidence::ClassFileMd5));
    }

    #[test]
    fn spring_boot_classpath_root_counts_as_package_match() {
        let jar = zip_bytes(&[(
            "BOOT-INF/classes/org/apache/logging/log4j/core/net/JndiManager.class",
            b"unknown",
        )]);
        let id = run(&memory_node("boot.jar", &jar, 0));
        assert_eq!(id.finding, Finding::NONE.with(Evidence::ClassPackageAndName));
    }

    #[test]
    fn oversized_class_gets_no_digest() {
        let config = CrawlerConfig::builder().max_class_size(4).build().unwrap();
        let identifier = Identifier::new(&config, Arc::new(ReaderRegistry::default()))
            .unwrap()
            .with_digests(digests());
        let jar = zip_bytes(&[(TARGET_CLASS_PATH, FAKE_CLASS)]);
        let id = identifier
            .identify(&memory_node("app.jar", &jar, 0), &CancellationToken::new())
            .unwrap();
        assert_eq!(id.finding, Finding::NONE.with(Evidence::ClassPackageAndName));
    }

    #[test]
    fn loose_class_on_disk() {
        let node = memory_node(
            "/opt/classes/org/apache/logging/log4j/core/net/JndiManager.class",
            FAKE_CLASS,
            0,
        );
        let id = run(&node);
        assert!(id.finding.contains(Evidence::ClassPackageAndName));
        assert!(id.finding.contains(Evidence::ClassFileMd5));

        let elsewhere = memory_node("/tmp/JndiManager.class", b"other", 0);
        assert_eq!(run(&elsewhere).finding, Finding::NONE.with(Evidence::ClassName));
    }

    #[test]
    fn nested_class_entry_is_not_re_attributed() {
        let node = memory_node(TARGET_CLASS_PATH, FAKE_CLASS, 1);
        assert!(run(&node).finding.is_empty());
    }

    #[test]
    fn tar_gz_listing_is_supported() {
        let tgz = gzip_bytes(&tar_bytes(&[("dist/lib/log4j-core-2.16.0.jar", b"x")]));
        let id = run(&memory_node("dist.tgz", &tgz, 0));
        assert_eq!(
            id.finding,
            Finding::NONE.with(Evidence::JarNameInsideArchive)
        );
        assert_eq!(id.cves(), vec![Cve::Cve2021_45105]);
    }

    #[test]
    fn corrupt_container_keeps_name_evidence() {
        let id = run(&memory_node("log4j-core-2.14.1.jar", b"not a zip", 0));
        assert_eq!(id.finding, Finding::NONE.with(Evidence::JarName));
    }

    #[test]
    fn listing_timeout_keeps_name_evidence_only() {
        let config = CrawlerConfig::builder()
            .archive_list_timeout(Duration::ZERO)
            .build()
            .unwrap();
        let identifier =
            Identifier::new(&config, Arc::new(ReaderRegistry::default())).unwrap();
        let war = zip_bytes(&[("WEB-INF/lib/log4j-core-2.14.1.jar", b"x")]);
        let id = identifier
            .identify(&memory_node("app.war", &war, 0), &CancellationToken::new())
            .unwrap();
        assert!(id.finding.is_empty());
    }

    #[test]
    fn stream_content_skips_listing() {
        let jar = zip_bytes(&[(TARGET_CLASS_PATH, FAKE_CLASS)]);
        let mut reader: &[u8] = &jar;
        let node = ScanNode {
            path: "outer.zip!inner.jar".to_owned(),
            name: "inner.jar",
            size: jar.len() as u64,
            modified: None,
            depth: 1,
            content: NodeContent::stream(&mut reader),
        };
        assert!(run(&node).finding.is_empty());
    }

    #[test]
    fn unreadable_loose_class_is_an_error() {
        let node = ScanNode {
            path: "/missing/JndiManager.class".to_owned(),
            name: "/missing/JndiManager.class",
            size: 0,
            modified: None,
            depth: 0,
            content: NodeContent::File(std::path::Path::new("/missing/JndiManager.class")),
        };
        let err = identifier()
            .identify(&node, &CancellationToken::new())
            .unwrap_err();
        assert!(err.to_string().contains("/missing/JndiManager.class"));
    }
}
