//! tar 계열 (tar, tar.gz, tar.bz2) 리더

use std::io::Read;
use std::time::{Duration, SystemTime};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;

use super::{
    ArchiveEntry, ContainerReader, Deadline, EntryVisitor, FormatType, ReadSeek, WalkControl,
};
use crate::error::ArchiveError;

/// tar 스트림을 감싸는 압축 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Bzip2,
}

/// tar 계열 컨테이너 리더
///
/// 압축 방식만 다르고 엔트리 순회는 동일하므로 한 타입이 세 포맷을 담당합니다.
#[derive(Debug, Clone, Copy)]
pub struct TarReader {
    compression: Compression,
}

impl TarReader {
    /// 비압축 tar
    pub fn plain() -> Self {
        Self {
            compression: Compression::None,
        }
    }

    /// gzip 압축 tar (`.tar.gz`, `.tgz`)
    pub fn gzip() -> Self {
        Self {
            compression: Compression::Gzip,
        }
    }

    /// bzip2 압축 tar (`.tar.bz2`, `.tbz2`)
    pub fn bzip2() -> Self {
        Self {
            compression: Compression::Bzip2,
        }
    }

    fn corrupt(&self, err: std::io::Error) -> ArchiveError {
        ArchiveError::Corrupt {
            format: self.format(),
            reason: err.to_string(),
        }
    }
}

impl ContainerReader for TarReader {
    fn format(&self) -> FormatType {
        match self.compression {
            Compression::None => FormatType::Tar,
            Compression::Gzip => FormatType::TarGz,
            Compression::Bzip2 => FormatType::TarBz2,
        }
    }

    fn walk<'s>(
        &self,
        source: Box<dyn ReadSeek + 's>,
        deadline: &Deadline,
        visit: &mut EntryVisitor<'_>,
    ) -> Result<(), ArchiveError> {
        deadline.check()?;
        let stream: Box<dyn Read + 's> = match self.compression {
            Compression::None => Box::new(source),
            Compression::Gzip => Box::new(GzDecoder::new(source)),
            Compression::Bzip2 => Box::new(BzDecoder::new(source)),
        };

        let mut archive = ::tar::Archive::new(stream);
        let entries = archive.entries().map_err(|e| self.corrupt(e))?;

        for entry in entries {
            deadline.check()?;
            let mut entry = entry.map_err(|e| self.corrupt(e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = entry
                .path()
                .map_err(|e| self.corrupt(e))?
                .to_string_lossy()
                .into_owned();
            let size = entry.size();
            let modified = entry
                .header()
                .mtime()
                .ok()
                .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs));

            let control = visit(ArchiveEntry {
                name: &name,
                size,
                modified,
                reader: &mut entry,
            })?;
            if control == WalkControl::Stop {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::testutil::{bzip2_bytes, gzip_bytes, tar_bytes};

    fn names_and_sizes(
        reader: TarReader,
        bytes: Vec<u8>,
    ) -> Result<Vec<(String, u64)>, ArchiveError> {
        let deadline = Deadline::unbounded(&CancellationToken::new());
        let mut seen = Vec::new();
        reader.walk(
            Box::new(Cursor::new(bytes)),
            &deadline,
            &mut |entry: ArchiveEntry<'_>| -> Result<WalkControl, ArchiveError> {
                let mut content = Vec::new();
                entry.reader.read_to_end(&mut content)?;
                assert_eq!(content.len() as u64, entry.size);
                seen.push((entry.name.to_owned(), entry.size));
                Ok(WalkControl::Continue)
            },
        )?;
        Ok(seen)
    }

    fn sample_tar() -> Vec<u8> {
        tar_bytes(&[
            ("opt/app/lib/log4j-core-2.14.1.jar", b"jar bytes"),
            ("opt/app/README", b"hello"),
        ])
    }

    #[test]
    fn plain_tar_entries() {
        let entries = names_and_sizes(TarReader::plain(), sample_tar()).unwrap();
        assert_eq!(
            entries,
            vec![
                ("opt/app/lib/log4j-core-2.14.1.jar".to_owned(), 9),
                ("opt/app/README".to_owned(), 5),
            ]
        );
    }

    #[test]
    fn gzip_wrapped_tar_entries() {
        let entries = names_and_sizes(TarReader::gzip(), gzip_bytes(&sample_tar())).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "opt/app/lib/log4j-core-2.14.1.jar");
    }

    #[test]
    fn bzip2_wrapped_tar_entries() {
        let entries = names_and_sizes(TarReader::bzip2(), bzip2_bytes(&sample_tar())).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].0, "opt/app/README");
    }

    #[test]
    fn gzip_reader_rejects_plain_tar() {
        let err = names_and_sizes(TarReader::gzip(), sample_tar()).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::Corrupt {
                format: FormatType::TarGz,
                ..
            }
        ));
    }

    #[test]
    fn formats_match_compression() {
        assert_eq!(TarReader::plain().format(), FormatType::Tar);
        assert_eq!(TarReader::gzip().format(), FormatType::TarGz);
        assert_eq!(TarReader::bzip2().format(), FormatType::TarBz2);
    }

    #[test]
    fn cancelled_deadline_aborts() {
        let parent = CancellationToken::new();
        let deadline = Deadline::unbounded(&parent);
        parent.cancel();
        let result = TarReader::plain().walk(
            Box::new(Cursor::new(sample_tar())),
            &deadline,
            &mut |_entry: ArchiveEntry<'_>| -> Result<WalkControl, ArchiveError> {
                Ok(WalkControl::Continue)
            },
        );
        assert!(matches!(result, Err(ArchiveError::Cancelled)));
    }
}
