//! zip 계열 (zip, jar, war, ear, par) 리더

use tracing::debug;

use super::{
    ArchiveEntry, ContainerReader, Deadline, EntryVisitor, FormatType, ReadSeek, WalkControl,
};
use crate::error::ArchiveError;

/// zip 계열 컨테이너 리더
///
/// 확장자가 달라도 구조는 같으므로 jar/war/ear/par 모두 이 리더를 씁니다.
/// 중앙 디렉토리 순서대로 엔트리를 방문합니다.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipReader;

fn corrupt(err: zip::result::ZipError) -> ArchiveError {
    match err {
        zip::result::ZipError::Io(e) => ArchiveError::Io(e),
        other => ArchiveError::Corrupt {
            format: FormatType::Zip,
            reason: other.to_string(),
        },
    }
}

impl ContainerReader for ZipReader {
    fn format(&self) -> FormatType {
        FormatType::Zip
    }

    fn walk<'s>(
        &self,
        source: Box<dyn ReadSeek + 's>,
        deadline: &Deadline,
        visit: &mut EntryVisitor<'_>,
    ) -> Result<(), ArchiveError> {
        deadline.check()?;
        let mut archive = zip::ZipArchive::new(source).map_err(corrupt)?;

        for index in 0..archive.len() {
            deadline.check()?;
            let mut file = match archive.by_index(index) {
                Ok(file) => file,
                Err(zip::result::ZipError::UnsupportedArchive(reason)) => {
                    // 암호화 또는 미지원 압축 방식 엔트리는 건너뜀
                    debug!(index, reason, "skipping unsupported zip entry");
                    continue;
                }
                Err(e) => return Err(corrupt(e)),
            };
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_owned();
            let size = file.size();
            let control = visit(ArchiveEntry {
                name: &name,
                size,
                modified: None,
                reader: &mut file,
            })?;
            if control == WalkControl::Stop {
                break;
            }
        }
        Ok(())
    }
}
