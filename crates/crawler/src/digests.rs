//! JndiManager 클래스 다이제스트 테이블

use std::collections::HashMap;

use md5::{Digest, Md5};
use semver::Version;

use crate::version::Log4jVersion;

/// 알려진 `JndiManager.class` MD5 와 해당 릴리스 범위
const KNOWN_JNDI_MANAGER: [(&str, (u64, u64, u64), (u64, u64, u64)); 11] = [
    ("04fdd701809d17465c17c7e603b1b202", (2, 9, 0), (2, 11, 2)),
    ("21f055b62c15453f0d7970a9d994cab7", (2, 13, 0), (2, 13, 3)),
    ("3bd9f41b89ce4fe8ccbf73e43195a5ce", (2, 6, 0), (2, 6, 2)),
    ("415c13e7c8505fb056d540eac29b72fa", (2, 7, 0), (2, 8, 1)),
    ("5824711d6c68162eb535cc4dbf7485d3", (2, 12, 0), (2, 12, 1)),
    ("6b15f42c333ac39abacfeeeb18852a44", (2, 1, 0), (2, 3, 0)),
    ("8b2260b1cce64144f6310876f94b1638", (2, 4, 0), (2, 5, 0)),
    ("a193703904a3f18fb3c90a877eb5c8a7", (2, 8, 2), (2, 8, 2)),
    ("f1d630c48928096a484e4b95ccb162a0", (2, 14, 0), (2, 14, 1)),
    ("5d253e53fa993e122ff012221aa49ec3", (2, 15, 0), (2, 15, 0)),
    ("ba1cf8f81e7b31c709768561ba8ab558", (2, 16, 0), (2, 16, 0)),
];

/// 바이트열의 MD5 (소문자 16진수)
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}

/// MD5 → 버전 범위 테이블
///
/// 테스트에서 임의 다이제스트를 주입할 수 있도록 식별기가 값으로 소유합니다.
#[derive(Debug, Clone, Default)]
pub struct DigestTable {
    entries: HashMap<String, Log4jVersion>,
}

impl DigestTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 공개 릴리스의 `JndiManager.class` 다이제스트
    pub fn known_jndi_manager() -> Self {
        let mut table = Self::empty();
        for (digest, (a, b, c), (x, y, z)) in KNOWN_JNDI_MANAGER {
            table.insert(
                digest,
                Log4jVersion::range(Version::new(a, b, c), Version::new(x, y, z)),
            );
        }
        table
    }

    /// 다이제스트를 추가합니다. 대소문자는 구분하지 않습니다.
    pub fn insert(&mut self, md5: impl AsRef<str>, version: Log4jVersion) {
        self.entries
            .insert(md5.as_ref().to_ascii_lowercase(), version);
    }

    pub fn lookup(&self, md5: &str) -> Option<&Log4jVersion> {
        self.entries.get(md5)
    }

    /// 바이트열을 해시해 테이블에서 찾습니다.
    pub fn lookup_content(&self, bytes: &[u8]) -> Option<&Log4jVersion> {
        self.lookup(&md5_hex(bytes))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
