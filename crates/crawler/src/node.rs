//! 스캔 노드
//!
//! 실제 파일과 컨테이너 안의 가상 엔트리를 같은 모양으로 식별기에 넘기기 위한 타입입니다.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;
use std::time::SystemTime;

use crate::archive::ReadSeek;

/// 노드 내용에 접근하는 방법
pub enum NodeContent<'a> {
    /// 실제 파일 시스템의 파일
    File(&'a Path),
    /// 메모리에 적재된 중첩 컨테이너
    Memory(&'a [u8]),
    /// 컨테이너 엔트리 스트림. 한 번만 읽을 수 있습니다.
    Stream(RefCell<&'a mut dyn Read>),
}

impl<'a> NodeContent<'a> {
    pub fn stream(reader: &'a mut dyn Read) -> Self {
        Self::Stream(RefCell::new(reader))
    }

    /// 최대 `limit` 바이트를 읽습니다. 내용이 더 길면 `None` 을 돌려줍니다.
    pub fn read_limited(&self, limit: u64) -> io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        match self {
            Self::File(path) => {
                File::open(path)?
                    .take(limit.saturating_add(1))
                    .read_to_end(&mut buf)?;
            }
            Self::Memory(bytes) => {
                if bytes.len() as u64 > limit {
                    return Ok(None);
                }
                return Ok(Some(bytes.to_vec()));
            }
            Self::Stream(reader) => {
                let mut reader = reader.borrow_mut();
                Read::take(&mut **reader, limit.saturating_add(1)).read_to_end(&mut buf)?;
            }
        }
        if buf.len() as u64 > limit {
            Ok(None)
        } else {
            Ok(Some(buf))
        }
    }

    /// 컨테이너로 열 수 있는 임의 접근 소스. 스트림 노드는 `None`.
    pub fn open_seekable(&self) -> io::Result<Option<Box<dyn ReadSeek + '_>>> {
        match self {
            Self::File(path) => Ok(Some(Box::new(BufReader::new(File::open(path)?)))),
            Self::Memory(bytes) => Ok(Some(Box::new(Cursor::new(*bytes)))),
            Self::Stream(_) => Ok(None),
        }
    }
}

/// 식별 대상 노드 하나
pub struct ScanNode<'a> {
    /// 보고용 경로. 중첩 엔트리는 `outer.war!WEB-INF/lib/x.jar` 형태
    pub path: String,
    /// 포맷 판별과 패키지 매칭에 쓰는 이름. 실제 파일은 전체 경로, 엔트리는 컨테이너 내부 경로
    pub name: &'a str,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// 컨테이너 중첩 깊이. 실제 파일은 0
    pub depth: usize,
    pub content: NodeContent<'a>,
}

impl ScanNode<'_> {
    pub fn is_nested(&self) -> bool {
        self.depth > 0
    }

    pub fn base_name(&self) -> &str {
        base_name(self.name)
    }
}

/// `/` 또는 `\` 뒤의 마지막 경로 구성요소
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}
