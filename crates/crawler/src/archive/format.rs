//! 파일 이름 기반 컨테이너 포맷 판별

use std::fmt;

use serde::Serialize;

/// 컨테이너 포맷
///
/// zip 계열 (`zip`, `jar`, `war`, `ear`, `par`)은 구조가 같으므로 하나의 변형으로 묶습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatType {
    /// 컨테이너가 아님
    None,
    /// zip 계열
    Zip,
    /// 비압축 tar
    Tar,
    /// gzip 압축 tar
    TarGz,
    /// bzip2 압축 tar
    TarBz2,
}

impl FormatType {
    /// 메트릭 레이블과 로그에 쓰는 짧은 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarBz2 => "tar.bz2",
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 확장자 → 포맷 테이블
const EXTENSIONS: &[(&str, FormatType)] = &[
    ("ear", FormatType::Zip),
    ("jar", FormatType::Zip),
    ("par", FormatType::Zip),
    ("war", FormatType::Zip),
    ("zip", FormatType::Zip),
    ("tar", FormatType::Tar),
    ("tar.gz", FormatType::TarGz),
    ("tgz", FormatType::TarGz),
    ("tar.bz2", FormatType::TarBz2),
    ("tbz2", FormatType::TarBz2),
];

fn lookup(suffix: &str) -> Option<FormatType> {
    EXTENSIONS
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(suffix))
        .map(|(_, format)| *format)
}

/// 파일 이름의 확장자로 컨테이너 포맷을 판별합니다.
///
/// 이름을 `.`으로 나눈 뒤 끝에서부터 두 조각짜리 복합 확장자를 먼저,
/// 그다음 한 조각짜리 확장자를 확인합니다. 따라서 `app.tar.gz`는 `gz`가 아니라
/// `tar.gz`로 판별됩니다.
///
/// 매칭되지 않으면 `(FormatType::None, false)`를 반환합니다. 이는 에러가 아니라
/// "아카이브가 아님"을 뜻합니다.
pub fn detect(filename: &str) -> (FormatType, bool) {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let segments: Vec<&str> = base.split('.').collect();

    if segments.len() > 2 {
        let compound = segments[segments.len() - 2..].join(".");
        if let Some(format) = lookup(&compound) {
            return (format, true);
        }
    }
    if segments.len() > 1
        && let Some(last) = segments.last()
        && let Some(format) = lookup(last)
    {
        return (format, true);
    }

    (FormatType::None, false)
}
