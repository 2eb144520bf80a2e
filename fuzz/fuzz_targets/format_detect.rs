#![no_main]

use jarsniff_crawler::detect;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(name) = std::str::from_utf8(data) {
        let (format, _) = detect(name);
        // 경로 구분자 뒤의 이름만 판정에 쓰임
        let (prefixed, _) = detect(&format!("some/dir/{name}"));
        if !name.contains(['/', '\\']) {
            assert_eq!(format, prefixed);
        }
    }
});
