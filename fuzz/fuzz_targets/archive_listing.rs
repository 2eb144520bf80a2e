#![no_main]

use std::io::{Cursor, Read};
use std::time::Duration;

use arbitrary::Arbitrary;
use jarsniff_crawler::archive::{Deadline, WalkControl};
use jarsniff_crawler::{FormatType, ReaderRegistry};
use libfuzzer_sys::fuzz_target;
use tokio_util::sync::CancellationToken;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    format: FuzzFormat,
    /// 엔트리마다 읽을 최대 바이트 수
    read_limit: u16,
    bytes: Vec<u8>,
}

#[derive(Arbitrary, Debug, Clone, Copy)]
enum FuzzFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
}

impl From<FuzzFormat> for FormatType {
    fn from(format: FuzzFormat) -> Self {
        match format {
            FuzzFormat::Zip => FormatType::Zip,
            FuzzFormat::Tar => FormatType::Tar,
            FuzzFormat::TarGz => FormatType::TarGz,
            FuzzFormat::TarBz2 => FormatType::TarBz2,
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let registry = ReaderRegistry::default();
    let Some(reader) = registry.get(input.format.into()) else {
        return;
    };
    let token = CancellationToken::new();
    let deadline = Deadline::after(Duration::from_secs(1), &token);
    let mut buf = vec![0u8; usize::from(input.read_limit)];

    // 손상된 입력은 에러로 끝나야 하며 panic 하면 안 됨
    let _ = reader.walk(
        Box::new(Cursor::new(input.bytes)),
        &deadline,
        &mut |entry| {
            let _ = entry.reader.read(&mut buf);
            Ok(WalkControl::Continue)
        },
    );
});
