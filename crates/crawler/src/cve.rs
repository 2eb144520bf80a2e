//! CVE 적용 범위 판정
//!
//! 두 CVE 는 같은 증거 신호로 탐지되고 해석된 버전으로만 구분됩니다.
//!
//! | CVE | 영향 범위 |
//! |-----|-----------|
//! | CVE-2021-45046 (기본) | `[2.0.0, 2.3.1)`, `[2.4.0, 2.12.2)`, `[2.13.0, 2.16.0)` |
//! | CVE-2021-45105 (좁은 대역) | `[2.0.0, 2.3.1)`, `[2.4.0, 2.12.3)`, `[2.13.0, 2.17.0)` |
//!
//! 범위 비교는 major.minor.patch 만 사용합니다. `2.0.0-beta9` 같은 사전 릴리스도
//! 2.0.0 으로 취급되어 영향 범위에 들어갑니다.

use std::fmt;

use semver::Version;
use serde::Serialize;

use crate::finding::Finding;
use crate::version::Log4jVersion;

/// 반열린 구간 `[introduced, fixed)`
#[derive(Debug, Clone, Copy)]
struct VersionRange {
    introduced: (u64, u64, u64),
    fixed: (u64, u64, u64),
}

impl VersionRange {
    const fn new(introduced: (u64, u64, u64), fixed: (u64, u64, u64)) -> Self {
        Self { introduced, fixed }
    }

    fn contains(&self, version: &Version) -> bool {
        let triple = (version.major, version.minor, version.patch);
        self.introduced <= triple && triple < self.fixed
    }
}

const CVE_2021_45046_RANGES: [VersionRange; 3] = [
    VersionRange::new((2, 0, 0), (2, 3, 1)),
    VersionRange::new((2, 4, 0), (2, 12, 2)),
    VersionRange::new((2, 13, 0), (2, 16, 0)),
];

const CVE_2021_45105_RANGES: [VersionRange; 3] = [
    VersionRange::new((2, 0, 0), (2, 3, 1)),
    VersionRange::new((2, 4, 0), (2, 12, 3)),
    VersionRange::new((2, 13, 0), (2, 17, 0)),
];

/// 탐지 대상 CVE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cve {
    /// 기본 CVE. 증거가 하나라도 있으면 해당
    Cve2021_45046,
    /// 좁은 대역 CVE. 설정으로 끌 수 있음
    Cve2021_45105,
}

impl Cve {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Cve2021_45046 => "CVE-2021-45046",
            Self::Cve2021_45105 => "CVE-2021-45105",
        }
    }

    fn ranges(&self) -> &'static [VersionRange] {
        match self {
            Self::Cve2021_45046 => &CVE_2021_45046_RANGES,
            Self::Cve2021_45105 => &CVE_2021_45105_RANGES,
        }
    }

    pub fn affects(&self, version: &Version) -> bool {
        self.ranges().iter().any(|range| range.contains(version))
    }
}

impl fmt::Display for Cve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Serialize for Cve {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

/// 증거와 해석된 버전으로 해당 CVE 목록을 계산합니다.
///
/// - 증거가 없으면 빈 목록
/// - 좁은 대역에만 속하는 버전이면 CVE-2021-45105 만
/// - CVE-2021-45105 범위 안의 버전이면 두 CVE 모두
/// - 버전을 모르거나 알려진 범위 밖이면 CVE-2021-45046 만
///
/// 기본 CVE 는 버전 때문에 빠지지 않습니다.
pub fn applicable_cves(finding: &Finding, version: Option<&Log4jVersion>) -> Vec<Cve> {
    if finding.is_empty() {
        return Vec::new();
    }
    match version {
        Some(v) if v.is_narrow_only() => vec![Cve::Cve2021_45105],
        Some(v) if v.affected_by(Cve::Cve2021_45105) => {
            vec![Cve::Cve2021_45046, Cve::Cve2021_45105]
        }
        _ => vec![Cve::Cve2021_45046],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Evidence;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn exact(s: &str) -> Log4jVersion {
        Log4jVersion::exact(v(s))
    }

    #[test]
    fn base_ranges() {
        let cve = Cve::Cve2021_45046;
        for affected in ["2.0.0", "2.0.0-beta9", "2.3.0", "2.4.0", "2.12.1", "2.13.0", "2.15.0"] {
            assert!(cve.affects(&v(affected)), "{affected}");
        }
        for safe in ["1.2.17", "2.3.1", "2.3.2", "2.12.2", "2.12.4", "2.16.0", "2.17.1"] {
            assert!(!cve.affects(&v(safe)), "{safe}");
        }
    }

    #[test]
    fn narrow_ranges() {
        let cve = Cve::Cve2021_45105;
        for affected in ["2.0.0", "2.12.2", "2.14.1", "2.16.0"] {
            assert!(cve.affects(&v(affected)), "{affected}");
        }
        for safe in ["2.3.1", "2.12.3", "2.17.0", "2.17.1"] {
            assert!(!cve.affects(&v(safe)), "{safe}");
        }
    }

    #[test]
    fn empty_finding_has_no_cves() {
        assert!(applicable_cves(&Finding::NONE, Some(&exact("2.14.1"))).is_empty());
    }

    #[test]
    fn affected_version_gets_both_cves() {
        let finding = Finding::NONE.with(Evidence::JarName);
        assert_eq!(
            applicable_cves(&finding, Some(&exact("2.14.1"))),
            vec![Cve::Cve2021_45046, Cve::Cve2021_45105]
        );
    }

    #[test]
    fn narrow_band_version_gets_only_narrow_cve() {
        let finding = Finding::NONE.with(Evidence::JarName);
        assert_eq!(
            applicable_cves(&finding, Some(&exact("2.16.0"))),
            vec![Cve::Cve2021_45105]
        );
        assert_eq!(
            applicable_cves(&finding, Some(&exact("2.12.2"))),
            vec![Cve::Cve2021_45105]
        );
    }

    #[test]
    fn unresolved_version_counts_under_base_cve_only() {
        let finding = Finding::NONE.with(Evidence::ClassName);
        assert_eq!(applicable_cves(&finding, None), vec![Cve::Cve2021_45046]);
    }

    #[test]
    fn version_outside_ranges_never_suppresses_base_cve() {
        let finding = Finding::NONE.with(Evidence::ClassPackageAndName);
        assert_eq!(
            applicable_cves(&finding, Some(&exact("2.17.1"))),
            vec![Cve::Cve2021_45046]
        );
    }

    #[test]
    fn serializes_as_identifier() {
        let json = serde_json::to_string(&vec![Cve::Cve2021_45046, Cve::Cve2021_45105]).unwrap();
        assert_eq!(json, r#"["CVE-2021-45046","CVE-2021-45105"]"#);
    }
}
