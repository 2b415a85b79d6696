//! 요약 정규화
//!
//! 파싱된 [`ScanReport`]를 스캐너 종류와 무관한 [`ScanSummary`]와
//! [`VulnerabilityRecord`] 목록으로 변환합니다.
//!
//! # 집계 규칙
//!
//! - 매치 하나당 `total`을 1 증가
//! - 스캐너 테이블에 있는 심각도면 해당 버킷 하나를 증가
//! - 테이블에 없는 심각도는 경고만 남기고 어떤 버킷도 증가시키지 않음
//!   (따라서 버킷 합계가 `total`보다 작을 수 있음)

use chrono::{DateTime, Utc};
use metrics::counter;
use rumble_core::metrics as m;

use crate::error::ScannerError;
use crate::report::ScanReport;
use crate::types::{ScanSummary, VulnerabilityRecord};

/// 리포트를 요약으로 정규화합니다.
///
/// # Errors
///
/// 스캐너가 repo digest를 하나도 보고하지 않으면 `DigestMissing`을 반환합니다.
/// 이 경우 부분 요약은 만들어지지 않습니다.
pub fn normalize(
    report: &ScanReport,
    scan_started: DateTime<Utc>,
    image: &str,
) -> Result<ScanSummary, ScannerError> {
    let kind = report.kind();
    let mut summary = ScanSummary::new(image, kind, scan_started);
    summary.scanner_version = report.version().version.clone();
    summary.scanner_db_version = report.version().db_version.clone();

    let first = report
        .body()
        .repo_digests()
        .first()
        .ok_or_else(|| ScannerError::DigestMissing {
            scanner: kind.to_string(),
            image: image.to_owned(),
        })?;
    summary.digest = strip_repository(first).to_owned();

    for severity in report.body().severities() {
        summary.total += 1;
        match kind.classify(severity) {
            Some(bucket) => summary.counts.record(bucket),
            None => {
                tracing::warn!(scanner = %kind, image, severity, "unknown severity");
                counter!(m::SCANNER_UNRECOGNIZED_SEVERITY_TOTAL, m::LABEL_SCANNER => kind.as_str())
                    .increment(1);
            }
        }
    }

    summary.raw_report_json = report.raw_json().to_owned();
    summary.success = true;

    counter!(m::SCANNER_SUMMARIES_TOTAL, m::LABEL_SCANNER => kind.as_str()).increment(1);
    counter!(m::SCANNER_MATCHES_TOTAL, m::LABEL_SCANNER => kind.as_str()).increment(summary.total);

    tracing::info!(
        scanner = %kind,
        image,
        digest = %summary.digest,
        total = summary.total,
        critical = summary.counts.critical,
        high = summary.counts.high,
        "scan summary built"
    );

    Ok(summary)
}

/// 리포트의 매치 목록을 `scan_id`에 속한 취약점 레코드로 추출합니다.
pub fn extract_vulnerabilities(report: &ScanReport, scan_id: &str) -> Vec<VulnerabilityRecord> {
    report.body().records(scan_id)
}

/// `repo@sha256:...`에서 첫 `@`까지를 제거합니다. `@`가 없으면 그대로 반환합니다.
///
/// 두 번째 이후의 `@`는 다이제스트 쪽에 남습니다 (`a@b@sha256:x` → `b@sha256:x`).
/// 저장된 행의 `digest` 값이 이 규칙에 묶여 있으므로 마지막 `@` 기준으로 바꾸지 않습니다.
fn strip_repository(repo_digest: &str) -> &str {
    repo_digest
        .split_once('@')
        .map_or(repo_digest, |(_, digest)| digest)
}
