//! 단위 테스트용 아카이브 픽스처 생성기

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

/// 파일 엔트리만 담은 zip 바이트
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    zip_bytes_with_dirs(&[], files)
}

/// 디렉토리 엔트리를 먼저 기록한 뒤 파일 엔트리를 담은 zip 바이트
pub fn zip_bytes_with_dirs(dirs: &[&str], files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for dir in dirs {
        writer.add_directory(*dir, options).unwrap();
    }
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// 압축하지 않은(stored) zip 바이트. 엔트리 내용이 그대로 들어갑니다.
pub fn stored_zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// `marker` 가 처음 나오는 위치의 바이트 하나를 뒤집어 CRC 검증이 실패하게 합니다.
pub fn corrupt_first(bytes: &mut [u8], marker: &[u8]) {
    let at = bytes
        .windows(marker.len())
        .position(|window| window == marker)
        .expect("marker present in archive");
    bytes[at] ^= 0xff;
}

/// 일반 파일 엔트리만 담은 tar 바이트
pub fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_639_000_000);
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn bzip2_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
