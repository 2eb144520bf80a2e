//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! 레코더가 설치되지 않은 경우 모든 호출은 no-op 입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `jarsniff_`
//! - 모듈명: `crawler_`, `image_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(jarsniff_core::metrics::CRAWLER_FILES_SCANNED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 컨테이너 포맷 레이블 키 (zip, tar, tar.gz, tar.bz2)
pub const LABEL_FORMAT: &str = "format";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Crawler 메트릭 ─────────────────────────────────────────────────

/// Crawler: 식별을 거친 노드 수 (실제 파일 + 아카이브 엔트리)
pub const CRAWLER_FILES_SCANNED_TOTAL: &str = "jarsniff_crawler_files_scanned_total";

/// Crawler: 열어본 컨테이너 수 (label: format)
pub const CRAWLER_ARCHIVES_OPENED_TOTAL: &str = "jarsniff_crawler_archives_opened_total";

/// Crawler: 취약 경로로 보고된 수
pub const CRAWLER_VULNERABLE_FILES_TOTAL: &str = "jarsniff_crawler_vulnerable_files_total";

/// Crawler: 스캔할 수 없었던 노드 수
pub const CRAWLER_UNSCANNABLE_TOTAL: &str = "jarsniff_crawler_unscannable_total";

/// Crawler: 리스팅 타임아웃 발생 수
pub const CRAWLER_LISTING_TIMEOUTS_TOTAL: &str = "jarsniff_crawler_listing_timeouts_total";

// ─── Image 메트릭 ───────────────────────────────────────────────────

/// Image: 스캔한 이미지 수 (label: result)
pub const IMAGE_SCANS_TOTAL: &str = "jarsniff_image_scans_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 레코더를 설치한 임베딩 프로그램이 시작 시점에 한 번 호출합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        CRAWLER_FILES_SCANNED_TOTAL,
        "Total number of files and archive entries identified"
    );
    describe_counter!(
        CRAWLER_ARCHIVES_OPENED_TOTAL,
        "Total number of containers opened for recursion"
    );
    describe_counter!(
        CRAWLER_VULNERABLE_FILES_TOTAL,
        "Total number of paths reported as vulnerable"
    );
    describe_counter!(
        CRAWLER_UNSCANNABLE_TOTAL,
        "Total number of nodes skipped because of errors"
    );
    describe_counter!(
        CRAWLER_LISTING_TIMEOUTS_TOTAL,
        "Total number of archive listings abandoned on timeout"
    );
    describe_counter!(IMAGE_SCANS_TOTAL, "Total number of container images scanned");
}
