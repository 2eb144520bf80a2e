//! log4j-core 버전 해석
//!
//! 파일명 `log4j-core-<major>.<minor>[.<patch>][-<qualifier>].jar` 에서 버전을 뽑아내고,
//! 다이제스트 테이블처럼 범위로만 알 수 있는 버전은 하한/상한 쌍으로 표현합니다.

use std::fmt;

use regex::Regex;
use semver::{Prerelease, Version};
use serde::{Serialize, Serializer};

use crate::cve::Cve;

/// 취약 라이브러리 파일명 패턴
const LOG4J_CORE_JAR: &str =
    r"^log4j-core-(\d+)\.(\d+)(?:\.(\d+))?(?:-([0-9A-Za-z][0-9A-Za-z.-]*))?\.jar$";

/// 해석된 log4j-core 버전
///
/// 파일명에서 얻은 버전은 하한과 상한이 같고, 다이제스트 테이블 항목은
/// `2.9.0 - 2.11.2` 처럼 범위를 가집니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log4jVersion {
    low: Version,
    high: Version,
}

impl Log4jVersion {
    pub fn exact(version: Version) -> Self {
        Self {
            low: version.clone(),
            high: version,
        }
    }

    /// 포함 범위 `[low, high]`. 순서가 뒤집혀 들어오면 바로잡습니다.
    pub fn range(low: Version, high: Version) -> Self {
        if low <= high {
            Self { low, high }
        } else {
            Self {
                low: high,
                high: low,
            }
        }
    }

    pub fn low(&self) -> &Version {
        &self.low
    }

    pub fn high(&self) -> &Version {
        &self.high
    }

    pub fn is_exact(&self) -> bool {
        self.low == self.high
    }

    /// 하한 또는 상한 중 하나라도 `cve` 영향 범위에 있는지 확인합니다.
    pub fn affected_by(&self, cve: Cve) -> bool {
        cve.affects(&self.low) || cve.affects(&self.high)
    }

    /// 둘 중 CVE-2021-45046 범위에 걸치는 버전을 고릅니다. 같은 조건이면 `self` 를 유지합니다.
    pub fn stronger(self, other: Self) -> Self {
        if !self.affected_by(Cve::Cve2021_45046) && other.affected_by(Cve::Cve2021_45046) {
            other
        } else {
            self
        }
    }

    /// CVE-2021-45105 에만 해당하는 버전인지 확인합니다.
    ///
    /// 범위 버전은 양 끝이 모두 좁은 대역에 있을 때만 참입니다.
    pub fn is_narrow_only(&self) -> bool {
        is_narrow_only(&self.low) && is_narrow_only(&self.high)
    }
}

fn is_narrow_only(version: &Version) -> bool {
    Cve::Cve2021_45105.affects(version) && !Cve::Cve2021_45046.affects(version)
}

impl fmt::Display for Log4jVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{} - {}", self.low, self.high)
        }
    }
}

impl Serialize for Log4jVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 컴파일된 파일명 패턴
#[derive(Debug, Clone)]
pub struct JarNamePattern {
    regex: Regex,
}

impl JarNamePattern {
    /// `log4j-core-*.jar` 패턴
    pub fn log4j_core() -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(LOG4J_CORE_JAR)?,
        })
    }

    /// 기본 파일명이 패턴에 맞으면 내장된 버전을 돌려줍니다. 대소문자를 구분합니다.
    pub fn parse(&self, base_name: &str) -> Option<Log4jVersion> {
        let caps = self.regex.captures(base_name)?;
        let number = |i: usize| -> Option<u64> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };
        let mut version = Version::new(number(1)?, number(2)?, number(3)?);
        if let Some(qualifier) = caps.get(4) {
            // semver 식별자 규칙에 맞지 않는 한정자 (예: 선행 0) 는 버림
            version.pre = Prerelease::new(qualifier.as_str()).unwrap_or(Prerelease::EMPTY);
        }
        Some(Log4jVersion::exact(version))
    }

    pub fn is_match(&self, base_name: &str) -> bool {
        self.regex.is_match(base_name)
    }
}
