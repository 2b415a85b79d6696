//! 최신 스캔 조회
//!
//! 한 스캐너의 저장 행 전체에서 이미지별 가장 최근(`time` 최대) 행을 고르고,
//! 각 행을 디코딩하여 심각도 카운트를 보고합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::ScannerError;
use crate::row::{ScanRow, decode};
use crate::store::ScanStore;
use crate::types::ScannerKind;

/// 이미지별 최신 행을 선택합니다.
///
/// 결과는 이미지 이름 순으로 정렬됩니다. `time`이 같은 행이 여럿이면
/// 입력 순서상 뒤에 오는 행을 선택합니다.
pub fn select_latest(rows: impl IntoIterator<Item = ScanRow>) -> Vec<ScanRow> {
    let mut latest: BTreeMap<String, ScanRow> = BTreeMap::new();
    for row in rows {
        match latest.get(&row.image) {
            Some(current) if current.time > row.time => {}
            _ => {
                latest.insert(row.image.clone(), row);
            }
        }
    }
    latest.into_values().collect()
}

/// 이미지 하나의 최신 심각도 카운트
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSeverityEntry {
    pub image: String,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub negligible: u64,
}

impl fmt::Display for ImageSeverityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.image)?;
        writeln!(f, " - Critical: {}", self.critical)?;
        writeln!(f, " - High:     {}", self.high)?;
        writeln!(f, " - Medium:   {}", self.medium)?;
        writeln!(f, " - Low:      {}", self.low)?;
        write!(f, " - Neg:      {}", self.negligible)
    }
}

/// 디코딩에 실패한 행
#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    pub row_id: String,
    pub image: String,
    pub reason: String,
}

/// 최신 스캔 리포트
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatestScanReport {
    /// 선택된 행 수 (카운트가 0인 행, 디코딩에 실패한 행 포함)
    ///
    /// 저장소에서 읽지 못한 행은 이미지를 알 수 없어 선택 대상이 아니므로 세지 않습니다.
    pub processed: usize,
    /// 다섯 버킷 합계가 0보다 큰 이미지
    pub entries: Vec<ImageSeverityEntry>,
    pub failures: Vec<RowFailure>,
}

/// 최신 행을 선택하고 디코딩하여 리포트를 만듭니다.
///
/// 한 행의 디코딩 실패는 그 행만 `failures`에 기록하고 나머지 행은 계속 처리합니다.
pub fn latest_scan_report(rows: impl IntoIterator<Item = ScanRow>) -> LatestScanReport {
    let mut report = LatestScanReport::default();

    for row in select_latest(rows) {
        report.processed += 1;
        let row_id = row.id.clone();
        let image = row.image.clone();
        match decode(row) {
            Ok((summary, vulnerabilities)) => {
                let c = summary.counts;
                tracing::debug!(
                    image = %summary.image,
                    time = %summary.time,
                    vulnerabilities = vulnerabilities.len(),
                    "decoded latest row"
                );
                if c.reported_total() == 0 {
                    continue;
                }
                report.entries.push(ImageSeverityEntry {
                    image: summary.image,
                    critical: c.critical,
                    high: c.high,
                    medium: c.medium,
                    low: c.low,
                    negligible: c.negligible,
                });
            }
            Err(e) => {
                let reason = match e {
                    ScannerError::StoredRowDecode { reason, .. } => reason,
                    other => other.to_string(),
                };
                tracing::warn!(%row_id, %image, %reason, "failed to decode stored row");
                report.failures.push(RowFailure {
                    row_id,
                    image,
                    reason,
                });
            }
        }
    }

    tracing::info!(
        processed = report.processed,
        reported = report.entries.len(),
        failed = report.failures.len(),
        "latest scan report built"
    );
    report
}

/// 저장소에서 한 스캐너의 행을 읽어 최신 스캔 리포트를 만듭니다.
///
/// 저장소가 읽지 못한 행은 디코딩 실패 뒤에 `failures`로 이어 붙입니다.
pub async fn query_latest<S: ScanStore>(
    store: &S,
    scanner: ScannerKind,
) -> Result<LatestScanReport, ScannerError> {
    let fetched = store.fetch_scans(scanner).await?;
    let mut report = latest_scan_report(fetched.rows);
    report.failures.extend(fetched.unreadable);
    Ok(report)
}
