//! 저장 행 코덱
//!
//! [`ScanSummary`]를 평탄한 [`ScanRow`]로 인코딩하고, 저장된 행을 다시
//! 요약과 취약점 목록으로 디코딩합니다. 취약점은 별도 컬럼이 아니라
//! `raw_report_json` 문자열 안에만 존재하며 디코딩 시 재파싱으로 복원됩니다.

use chrono::{DateTime, Utc};
use metrics::counter;
use rumble_core::metrics as m;
use serde::{Deserialize, Serialize};

use crate::error::ScannerError;
use crate::normalize::extract_vulnerabilities;
use crate::report::ScanReport;
use crate::types::{ScanSummary, ScannerKind, SeverityCounts, VulnerabilityRecord};

/// 분석 저장소의 스캔 요약 행
///
/// 컬럼 이름은 기존 테이블 스키마(`low_cve_count`, `crit_cve_count` 등)를 따릅니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub id: String,
    pub image: String,
    pub digest: String,
    pub scanner: ScannerKind,
    #[serde(default)]
    pub scanner_version: String,
    #[serde(default)]
    pub scanner_db_version: String,
    pub time: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub low_cve_count: u64,
    #[serde(default)]
    pub med_cve_count: u64,
    #[serde(default)]
    pub high_cve_count: u64,
    #[serde(default)]
    pub crit_cve_count: u64,
    #[serde(default)]
    pub negligible_cve_count: u64,
    #[serde(default)]
    pub unknown_cve_count: u64,
    #[serde(default)]
    pub tot_cve_count: u64,
    /// 원본 리포트 (비어 있을 수 있음)
    #[serde(default)]
    pub raw_report_json: String,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl ScanRow {
    /// 행의 심각도 카운트
    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts {
            low: self.low_cve_count,
            medium: self.med_cve_count,
            high: self.high_cve_count,
            critical: self.crit_cve_count,
            negligible: self.negligible_cve_count,
            unknown: self.unknown_cve_count,
        }
    }
}

/// 요약을 저장 행으로 인코딩합니다.
pub fn encode(summary: &ScanSummary) -> ScanRow {
    ScanRow {
        id: summary.id.clone(),
        image: summary.image.clone(),
        digest: summary.digest.clone(),
        scanner: summary.scanner,
        scanner_version: summary.scanner_version.clone(),
        scanner_db_version: summary.scanner_db_version.clone(),
        time: summary.time,
        created: summary.created,
        success: summary.success,
        low_cve_count: summary.counts.low,
        med_cve_count: summary.counts.medium,
        high_cve_count: summary.counts.high,
        crit_cve_count: summary.counts.critical,
        negligible_cve_count: summary.counts.negligible,
        unknown_cve_count: summary.counts.unknown,
        tot_cve_count: summary.total,
        raw_report_json: summary.raw_report_json.clone(),
    }
}

/// 저장 행을 요약과 취약점 목록으로 디코딩합니다.
///
/// 스칼라 필드는 그대로 복사하고, `raw_report_json`이 비어 있지 않으면
/// 행의 스캐너 스키마로 재파싱하여 취약점 목록을 복원합니다.
/// 원본 리포트가 없는 행은 빈 목록을 반환합니다.
///
/// # Errors
///
/// 재파싱에 실패하면 해당 행에 대해 `StoredRowDecode`를 반환합니다.
pub fn decode(row: ScanRow) -> Result<(ScanSummary, Vec<VulnerabilityRecord>), ScannerError> {
    let vulnerabilities = if row.raw_report_json.is_empty() {
        Vec::new()
    } else {
        let report = ScanReport::parse(row.scanner, row.raw_report_json.as_bytes()).map_err(|e| {
            counter!(m::QUERY_ROWS_DECODED_TOTAL, m::LABEL_RESULT => "failure").increment(1);
            ScannerError::StoredRowDecode {
                row_id: row.id.clone(),
                image: row.image.clone(),
                reason: e.to_string(),
            }
        })?;
        extract_vulnerabilities(&report, &row.id)
    };

    counter!(m::QUERY_ROWS_DECODED_TOTAL, m::LABEL_RESULT => "success").increment(1);

    let counts = row.counts();
    let summary = ScanSummary {
        id: row.id,
        image: row.image,
        digest: row.digest,
        scanner: row.scanner,
        scanner_version: row.scanner_version,
        scanner_db_version: row.scanner_db_version,
        time: row.time,
        created: row.created,
        success: row.success,
        counts,
        total: row.tot_cve_count,
        raw_report_json: row.raw_report_json,
    };
    Ok((summary, vulnerabilities))
}
