//! 컨테이너 포맷 판별과 포맷별 엔트리 리더
//!
//! 각 포맷은 [`ContainerReader`]를 구현하고 [`ReaderRegistry`]에 등록됩니다.
//! 워커와 식별기는 레지스트리에서 [`FormatType`]으로 리더를 찾기만 하므로,
//! 새 포맷을 추가해도 워커 코드는 바뀌지 않습니다.
//!
//! # 엔트리 순회
//!
//! tar 엔트리는 아카이브 스트림을 빌려 쓰므로 이터레이터로 밖에 내보낼 수 없습니다.
//! 대신 리더가 컨테이너 순서대로 엔트리를 하나씩 읽어 방문자 콜백에 넘기며,
//! 한 번 지나간 엔트리는 컨테이너를 다시 열지 않는 한 다시 볼 수 없습니다.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::time::SystemTime;

pub mod deadline;
pub mod format;
pub mod tar_reader;
pub mod zip_reader;

pub use deadline::Deadline;
pub use format::{FormatType, detect};

use crate::error::ArchiveError;

/// 임의 접근이 가능한 바이트 소스
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// 컨테이너 안의 일반 파일 엔트리 하나
///
/// 디렉토리, 심볼릭 링크, 특수 파일 엔트리는 리더가 걸러내므로 방문자에게 오지 않습니다.
pub struct ArchiveEntry<'a> {
    /// 컨테이너 내부 경로
    pub name: &'a str,
    /// 압축 해제 후 크기 (헤더 기준)
    pub size: u64,
    /// 수정 시각 (포맷이 제공하는 경우)
    pub modified: Option<SystemTime>,
    /// 엔트리 내용. 방문자 호출이 끝나면 더 이상 읽을 수 없습니다.
    pub reader: &'a mut dyn Read,
}

/// 방문자가 순회를 계속할지 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    Stop,
}

/// 엔트리 방문자 콜백
pub type EntryVisitor<'v> =
    dyn FnMut(ArchiveEntry<'_>) -> Result<WalkControl, ArchiveError> + 'v;

/// 포맷별 컨테이너 리더
pub trait ContainerReader: Send + Sync {
    /// 이 리더가 처리하는 포맷
    fn format(&self) -> FormatType;

    /// `source`를 컨테이너로 열고 엔트리를 순서대로 `visit`에 넘깁니다.
    ///
    /// 엔트리마다 `deadline`을 확인하며, 만료되면 [`ArchiveError::Timeout`],
    /// 취소되면 [`ArchiveError::Cancelled`]로 중단합니다. 방문자가 돌려준 에러는
    /// 그대로 전파됩니다.
    fn walk<'s>(
        &self,
        source: Box<dyn ReadSeek + 's>,
        deadline: &Deadline,
        visit: &mut EntryVisitor<'_>,
    ) -> Result<(), ArchiveError>;
}

/// [`FormatType`]별 리더 테이블
pub struct ReaderRegistry {
    readers: HashMap<FormatType, Box<dyn ContainerReader>>,
}

impl ReaderRegistry {
    /// 리더가 하나도 없는 레지스트리
    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// 리더를 등록합니다. 같은 포맷의 기존 리더가 있으면 교체하고 반환합니다.
    pub fn register(
        &mut self,
        reader: Box<dyn ContainerReader>,
    ) -> Option<Box<dyn ContainerReader>> {
        self.readers.insert(reader.format(), reader)
    }

    pub fn get(&self, format: FormatType) -> Option<&dyn ContainerReader> {
        self.readers.get(&format).map(|reader| reader.as_ref())
    }

    /// 등록된 포맷 목록
    pub fn formats(&self) -> Vec<FormatType> {
        self.readers.keys().copied().collect()
    }
}

impl Default for ReaderRegistry {
    /// zip 계열과 세 가지 tar 계열 리더를 등록한 레지스트리
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(zip_reader::ZipReader));
        registry.register(Box::new(tar_reader::TarReader::plain()));
        registry.register(Box::new(tar_reader::TarReader::gzip()));
        registry.register(Box::new(tar_reader::TarReader::bzip2()));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullReader;

    impl ContainerReader for NullReader {
        fn format(&self) -> FormatType {
            FormatType::Zip
        }

        fn walk<'s>(
            &self,
            _source: Box<dyn ReadSeek + 's>,
            _deadline: &Deadline,
            _visit: &mut EntryVisitor<'_>,
        ) -> Result<(), ArchiveError> {
            Ok(())
        }
    }

    #[test]
    fn default_registry_covers_all_container_formats() {
        let registry = ReaderRegistry::default();
        for format in [
            FormatType::Zip,
            FormatType::Tar,
            FormatType::TarGz,
            FormatType::TarBz2,
        ] {
            let reader = registry.get(format).expect("reader registered");
            assert_eq!(reader.format(), format);
        }
        assert!(registry.get(FormatType::None).is_none());
    }

    #[test]
    fn register_replaces_existing_reader() {
        let mut registry = ReaderRegistry::default();
        let previous = registry.register(Box::new(NullReader));
        assert!(previous.is_some());
        assert_eq!(registry.formats().len(), 4);
    }

    #[test]
    fn empty_registry_has_no_readers() {
        let registry = ReaderRegistry::empty();
        assert!(registry.get(FormatType::Tar).is_none());
        assert!(registry.formats().is_empty());
    }
}
