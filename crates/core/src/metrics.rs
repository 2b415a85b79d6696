//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! 레코더가 설치되지 않은 경우 매크로 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `rumble_`
//! - 구성 요소: `scanner_`, `store_`, `query_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(rumble_core::metrics::SCANNER_SUMMARIES_TOTAL, "scanner" => "grype").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스캐너 레이블 키 (trivy, grype)
pub const LABEL_SCANNER: &str = "scanner";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 테이블 레이블 키
pub const LABEL_TABLE: &str = "table";

// ─── Scanner 메트릭 ─────────────────────────────────────────────────

/// Scanner: 생성된 요약 수 (counter, label: scanner)
pub const SCANNER_SUMMARIES_TOTAL: &str = "rumble_scanner_summaries_total";

/// Scanner: 처리된 매치 수 (counter, label: scanner)
pub const SCANNER_MATCHES_TOTAL: &str = "rumble_scanner_matches_total";

/// Scanner: 인식하지 못한 심각도 문자열 수 (counter, label: scanner)
pub const SCANNER_UNRECOGNIZED_SEVERITY_TOTAL: &str =
    "rumble_scanner_unrecognized_severity_total";

/// Scanner: 외부 스캐너 실행 시간 (histogram, 초)
pub const SCANNER_SCAN_DURATION_SECONDS: &str = "rumble_scanner_scan_duration_seconds";

// ─── Store 메트릭 ───────────────────────────────────────────────────

/// Store: 추가된 행 수 (counter, label: table)
pub const STORE_ROWS_APPENDED_TOTAL: &str = "rumble_store_rows_appended_total";

// ─── Query 메트릭 ───────────────────────────────────────────────────

/// Query: 디코딩된 저장 행 수 (counter, label: result)
pub const QUERY_ROWS_DECODED_TOTAL: &str = "rumble_query_rows_decoded_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        SCANNER_SUMMARIES_TOTAL,
        "Total number of scan summaries successfully normalized"
    );
    describe_counter!(
        SCANNER_MATCHES_TOTAL,
        "Total number of scanner matches counted into summaries"
    );
    describe_counter!(
        SCANNER_UNRECOGNIZED_SEVERITY_TOTAL,
        "Matches whose severity string was not in the scanner's table"
    );
    describe_histogram!(
        SCANNER_SCAN_DURATION_SECONDS,
        "Wall-clock duration of external scanner runs in seconds"
    );
    describe_counter!(
        STORE_ROWS_APPENDED_TOTAL,
        "Total number of rows appended to the analytical store"
    );
    describe_counter!(
        QUERY_ROWS_DECODED_TOTAL,
        "Stored scan rows decoded by the latest-scan query"
    );
}
