//! 증거 플래그 집합
//!
//! [`Finding`]은 노드 하나에 대해 모은 독립적인 증거 플래그의 집합입니다.
//! 불투명한 비트마스크 대신 이름 있는 불리언 필드로 표현하며, 아래 두 불변식을
//! 삽입과 합집합 시점에 항상 유지합니다.
//!
//! - `ClassPackageAndName`은 `ClassName`을 포함합니다. 둘이 동시에 설정되지 않습니다.
//! - `JarNameInsideArchive`는 같은 노드에 `JarName`이 없을 때만 설정됩니다.
//!
//! `ClassFileMd5`는 클래스 매칭 없이 설정되지 않습니다. 식별기가 찾은 클래스만
//! 해시하기 때문이며, [`Finding::is_consistent`]로 검증할 수 있습니다.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// 증거 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Evidence {
    /// 파일 자체 이름이 취약 라이브러리 파일명 패턴에 매칭
    JarName,
    /// 컨테이너 리스팅에서 중첩 엔트리 이름이 패턴에 매칭
    JarNameInsideArchive,
    /// 클래스 단순 이름만 매칭 (재배치/셰이딩 가능성)
    ClassName,
    /// 패키지를 포함한 클래스 경로 전체가 매칭
    ClassPackageAndName,
    /// 매칭된 클래스의 MD5가 알려진 다이제스트 테이블에 존재
    ClassFileMd5,
}

impl Evidence {
    pub const ALL: [Evidence; 5] = [
        Evidence::JarName,
        Evidence::JarNameInsideArchive,
        Evidence::ClassName,
        Evidence::ClassPackageAndName,
        Evidence::ClassFileMd5,
    ];

    /// 구조화 레코드의 필드 이름
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::JarName => "jarNameMatched",
            Self::JarNameInsideArchive => "jarNameInsideArchiveMatched",
            Self::ClassName => "classNameMatched",
            Self::ClassPackageAndName => "classPackageAndNameMatched",
            Self::ClassFileMd5 => "classFileMd5Matched",
        }
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// 노드 하나의 증거 플래그 집합
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Finding {
    jar_name: bool,
    jar_name_inside_archive: bool,
    class_name: bool,
    class_package_and_name: bool,
    class_file_md5: bool,
}

impl Finding {
    /// 플래그가 하나도 없는 집합
    pub const NONE: Finding = Finding {
        jar_name: false,
        jar_name_inside_archive: false,
        class_name: false,
        class_package_and_name: false,
        class_file_md5: false,
    };

    pub fn contains(&self, evidence: Evidence) -> bool {
        match evidence {
            Evidence::JarName => self.jar_name,
            Evidence::JarNameInsideArchive => self.jar_name_inside_archive,
            Evidence::ClassName => self.class_name,
            Evidence::ClassPackageAndName => self.class_package_and_name,
            Evidence::ClassFileMd5 => self.class_file_md5,
        }
    }

    /// 플래그를 추가하고 포함 관계를 정규화합니다.
    pub fn insert(&mut self, evidence: Evidence) {
        match evidence {
            Evidence::JarName => self.jar_name = true,
            Evidence::JarNameInsideArchive => self.jar_name_inside_archive = true,
            Evidence::ClassName => self.class_name = true,
            Evidence::ClassPackageAndName => self.class_package_and_name = true,
            Evidence::ClassFileMd5 => self.class_file_md5 = true,
        }
        self.normalize();
    }

    /// 플래그를 추가한 새 집합
    pub fn with(mut self, evidence: Evidence) -> Self {
        self.insert(evidence);
        self
    }

    fn normalize(&mut self) {
        if self.class_package_and_name {
            self.class_name = false;
        }
        if self.jar_name {
            self.jar_name_inside_archive = false;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// 클래스 이름 또는 패키지+이름 매칭 여부
    pub fn has_class_match(&self) -> bool {
        self.class_name || self.class_package_and_name
    }

    /// 모든 불변식을 만족하는지 확인합니다.
    pub fn is_consistent(&self) -> bool {
        !(self.class_name && self.class_package_and_name)
            && !(self.jar_name && self.jar_name_inside_archive)
            && (!self.class_file_md5 || self.has_class_match())
    }

    /// 설정된 플래그를 [`Evidence::ALL`] 순서로 나열합니다.
    pub fn iter(&self) -> impl Iterator<Item = Evidence> + '_ {
        Evidence::ALL.into_iter().filter(|e| self.contains(*e))
    }
}

impl BitOr for Finding {
    type Output = Finding;

    fn bitor(self, rhs: Finding) -> Finding {
        let mut merged = Finding {
            jar_name: self.jar_name || rhs.jar_name,
            jar_name_inside_archive: self.jar_name_inside_archive || rhs.jar_name_inside_archive,
            class_name: self.class_name || rhs.class_name,
            class_package_and_name: self.class_package_and_name || rhs.class_package_and_name,
            class_file_md5: self.class_file_md5 || rhs.class_file_md5,
        };
        merged.normalize();
        merged
    }
}

impl BitOrAssign for Finding {
    fn bitor_assign(&mut self, rhs: Finding) {
        *self = *self | rhs;
    }
}
