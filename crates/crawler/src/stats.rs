//! 크롤 통계

use serde::Serialize;

use crate::finding::{Evidence, Finding};

/// 크롤 하나(또는 여러 크롤을 합친 결과)의 누적 카운터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// 식별을 거친 노드 수 (실제 파일 + 가상 엔트리)
    pub files_scanned: u64,
    /// 보고 대상이 된 경로 수
    pub vulnerable_files: u64,
    /// 에러로 건너뛴 노드 수
    pub unscannable_files: u64,
    pub jar_name: u64,
    pub jar_name_inside_archive: u64,
    pub class_name: u64,
    pub class_package_and_name: u64,
    pub class_file_md5: u64,
}

impl Stats {
    /// 증거 플래그별 카운터를 올립니다.
    pub fn record_finding(&mut self, finding: &Finding) {
        for evidence in finding.iter() {
            *self.evidence_counter(evidence) += 1;
        }
    }

    fn evidence_counter(&mut self, evidence: Evidence) -> &mut u64 {
        match evidence {
            Evidence::JarName => &mut self.jar_name,
            Evidence::JarNameInsideArchive => &mut self.jar_name_inside_archive,
            Evidence::ClassName => &mut self.class_name,
            Evidence::ClassPackageAndName => &mut self.class_package_and_name,
            Evidence::ClassFileMd5 => &mut self.class_file_md5,
        }
    }

    /// 다른 누적기를 합칩니다.
    pub fn append(&mut self, other: &Stats) {
        self.files_scanned += other.files_scanned;
        self.vulnerable_files += other.vulnerable_files;
        self.unscannable_files += other.unscannable_files;
        self.jar_name += other.jar_name;
        self.jar_name_inside_archive += other.jar_name_inside_archive;
        self.class_name += other.class_name;
        self.class_package_and_name += other.class_package_and_name;
        self.class_file_md5 += other.class_file_md5;
    }

    /// 누적 취약 경로 수
    pub fn count(&self) -> u64 {
        self.vulnerable_files
    }
}
