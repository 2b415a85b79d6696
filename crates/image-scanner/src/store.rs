//! 분석 저장소
//!
//! [`ScanStore`]는 append-only 싱크(스캔 요약 행, 취약점 행)와
//! 스캐너별 행 조회를 추상화합니다. 기본 구현인 [`JsonlStore`]는
//! `dataset/table` 쌍마다 줄 단위 JSON 파일 하나를 사용합니다.
//!
//! ```text
//! <root_dir>/[<project>/]<dataset>/<table>.jsonl        (ScanRow)
//! <root_dir>/[<project>/]<dataset>/<vulns_table>.jsonl  (VulnerabilityRecord)
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};

use metrics::counter;
use rumble_core::config::StoreConfig;
use rumble_core::metrics as m;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::ScannerError;
use crate::latest::RowFailure;
use crate::normalize::extract_vulnerabilities;
use crate::report::ScanReport;
use crate::row::{ScanRow, encode};
use crate::types::{ScanSummary, ScannerKind, VulnerabilityRecord};

/// 분석 저장소 추상화
///
/// 행은 추가만 되며 수정이나 삭제는 없습니다.
pub trait ScanStore: Send + Sync + 'static {
    /// 스캔 요약 행을 추가합니다.
    fn append_scan(&self, row: &ScanRow) -> impl Future<Output = Result<(), ScannerError>> + Send;

    /// 취약점 행을 추가합니다.
    fn append_vulnerabilities(
        &self,
        records: &[VulnerabilityRecord],
    ) -> impl Future<Output = Result<(), ScannerError>> + Send;

    /// 지정한 스캐너의 스캔 행을 순서 없이 조회합니다.
    ///
    /// 행 하나를 읽지 못해도 조회 전체가 실패하지 않습니다.
    /// 그런 행은 [`FetchedScans::unreadable`]에 담깁니다.
    fn fetch_scans(
        &self,
        scanner: ScannerKind,
    ) -> impl Future<Output = Result<FetchedScans, ScannerError>> + Send;
}

/// 스캔 행 조회 결과
#[derive(Debug, Clone, Default)]
pub struct FetchedScans {
    pub rows: Vec<ScanRow>,
    /// `ScanRow`로 역직렬화되지 않은 행
    pub unreadable: Vec<RowFailure>,
}

/// 스캔 결과를 저장소에 기록합니다.
///
/// 요약에 ID를 부여하고 요약 행 하나를 추가한 뒤, 취약점이 있으면
/// 같은 ID를 `scan_id`로 가진 취약점 행을 추가합니다. 추가한 취약점 수를 반환합니다.
pub async fn persist_scan<S: ScanStore>(
    store: &S,
    summary: &mut ScanSummary,
    report: &ScanReport,
) -> Result<usize, ScannerError> {
    let scan_id = summary.assign_id().to_owned();
    let vulnerabilities = extract_vulnerabilities(report, &scan_id);

    store.append_scan(&encode(summary)).await?;
    tracing::info!(%scan_id, image = %summary.image, "stored scan summary");

    if !vulnerabilities.is_empty() {
        store.append_vulnerabilities(&vulnerabilities).await?;
        tracing::info!(%scan_id, count = vulnerabilities.len(), "stored vulnerability rows");
    }
    Ok(vulnerabilities.len())
}

/// 줄 단위 JSON 파일 저장소
#[derive(Debug)]
pub struct JsonlStore {
    scans_path: PathBuf,
    vulns_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// 디렉토리와 테이블 이름으로 저장소를 생성합니다.
    pub fn new(dir: impl AsRef<Path>, table: &str, vulns_table: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            scans_path: dir.join(format!("{table}.jsonl")),
            vulns_path: dir.join(format!("{vulns_table}.jsonl")),
            write_lock: Mutex::new(()),
        }
    }

    /// core `[store]` 설정에서 저장소를 생성합니다.
    pub fn from_config(config: &StoreConfig) -> Self {
        let mut dir = PathBuf::from(&config.root_dir);
        if !config.project.is_empty() {
            dir.push(&config.project);
        }
        dir.push(&config.dataset);
        Self::new(dir, &config.table, &config.vulns_table)
    }

    pub fn scans_path(&self) -> &Path {
        &self.scans_path
    }

    pub fn vulns_path(&self) -> &Path {
        &self.vulns_path
    }

    async fn append_lines<T: Serialize>(&self, path: &Path, rows: &[T]) -> Result<(), ScannerError> {
        let table = table_name(path);
        let mut buf = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buf, row).map_err(|e| ScannerError::Store {
                table: table.clone(),
                reason: e.to_string(),
            })?;
            buf.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScannerError::io(parent, e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| ScannerError::io(path, e))?;
        file.write_all(&buf).await.map_err(|e| ScannerError::io(path, e))?;
        file.flush().await.map_err(|e| ScannerError::io(path, e))?;

        counter!(m::STORE_ROWS_APPENDED_TOTAL, m::LABEL_TABLE => table).increment(rows.len() as u64);
        Ok(())
    }
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ScanStore for JsonlStore {
    async fn append_scan(&self, row: &ScanRow) -> Result<(), ScannerError> {
        self.append_lines(&self.scans_path, std::slice::from_ref(row)).await
    }

    async fn append_vulnerabilities(&self, records: &[VulnerabilityRecord]) -> Result<(), ScannerError> {
        self.append_lines(&self.vulns_path, records).await
    }

    async fn fetch_scans(&self, scanner: ScannerKind) -> Result<FetchedScans, ScannerError> {
        let content = match tokio::fs::read_to_string(&self.scans_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.scans_path.display(), "scan table does not exist yet");
                return Ok(FetchedScans::default());
            }
            Err(e) => return Err(ScannerError::io(&self.scans_path, e)),
        };

        let table = table_name(&self.scans_path);
        let mut fetched = FetchedScans::default();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ScanRow>(line) {
                Ok(row) if row.scanner == scanner => fetched.rows.push(row),
                Ok(_) => {}
                Err(e) => {
                    if let Some(failure) = unreadable_row(line, scanner, &table, idx + 1, &e) {
                        tracing::warn!(
                            %table,
                            line = idx + 1,
                            row_id = %failure.row_id,
                            error = %e,
                            "skipping unreadable scan row"
                        );
                        fetched.unreadable.push(failure);
                    }
                }
            }
        }
        Ok(fetched)
    }
}

/// 역직렬화에 실패한 줄에서 식별 가능한 필드를 최대한 건집니다.
///
/// `scanner` 필드가 다른 스캐너를 가리키면 `None`을 반환합니다.
fn unreadable_row(
    line: &str,
    scanner: ScannerKind,
    table: &str,
    line_no: usize,
    error: &serde_json::Error,
) -> Option<RowFailure> {
    let value = serde_json::from_str::<serde_json::Value>(line).ok();
    let field = |name: &str| {
        value
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
    };

    if field("scanner").is_some_and(|s| s != scanner.as_str()) {
        return None;
    }
    Some(RowFailure {
        row_id: field("id").unwrap_or_else(|| format!("{table}:{line_no}")),
        image: field("image").unwrap_or_default(),
        reason: format!("{table} line {line_no}: {error}"),
    })
}
