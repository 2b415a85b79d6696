//! Integration tests for the latest-scan query
//!
//! Tests the read path: JsonlStore -> ScanRow -> select_latest -> decode -> LatestScanReport

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use rumble_scanner::row::encode;
use rumble_scanner::{
    JsonlStore, ScanReport, ScanRow, ScanStore, ScanSummary, ScannerKind, latest_scan_report,
    normalize, persist_scan, query_latest, select_latest,
};

fn fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
}

fn row(image: &str, time: DateTime<Utc>, crit: u64, high: u64) -> ScanRow {
    let mut s = ScanSummary::new(image, ScannerKind::Grype, time);
    s.id = format!("{image}@{}", time.timestamp());
    s.digest = "sha256:1".to_owned();
    s.success = true;
    s.counts.critical = crit;
    s.counts.high = high;
    s.total = crit + high;
    encode(&s)
}

#[test]
fn test_selects_latest_row_per_image() {
    let rows = vec![
        row("x", at(1), 1, 0),
        row("y", at(4), 0, 2),
        row("x", at(3), 3, 0),
        row("x", at(2), 2, 0),
    ];
    let picked = select_latest(rows);

    assert_eq!(picked.len(), 2);
    assert_eq!(picked[0].image, "x");
    assert_eq!(picked[0].time, at(3));
    assert_eq!(picked[0].crit_cve_count, 3);
    assert_eq!(picked[1].image, "y");
    assert_eq!(picked[1].time, at(4));
}

#[test]
fn test_report_is_ordered_by_image() {
    let rows = vec![row("zeta", at(1), 1, 0), row("alpha", at(1), 0, 1)];
    let report = latest_scan_report(rows);
    let images: Vec<_> = report.entries.iter().map(|e| e.image.as_str()).collect();
    assert_eq!(images, ["alpha", "zeta"]);
}

#[test]
fn test_zero_count_latest_row_is_excluded_but_processed() {
    // x의 최신 스캔은 취약점 0건 (이전 스캔에는 있었음)
    let rows = vec![
        row("x", at(1), 5, 5),
        row("x", at(2), 0, 0),
        row("y", at(1), 0, 1),
    ];
    let report = latest_scan_report(rows);

    assert_eq!(report.processed, 2);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].image, "y");
    assert_eq!(report.entries[0].high, 1);
    assert!(report.failures.is_empty());
}

#[test]
fn test_decode_failure_is_isolated_to_row() {
    let mut broken = row("broken", at(2), 1, 0);
    broken.raw_report_json = "{\"matches\": [}".to_owned();
    let rows = vec![broken, row("ok", at(1), 2, 0)];

    let report = latest_scan_report(rows);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].image, "broken");
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].image, "ok");
    assert_eq!(report.entries[0].critical, 2);
}

#[test]
fn test_entry_counts_include_negligible() {
    let report = ScanReport::parse(ScannerKind::Grype, &fixture("grype.json")).unwrap();
    let summary = normalize(&report, at(5), "alpine:3.18").unwrap();
    let latest = latest_scan_report(vec![encode(&summary)]);

    let e = &latest.entries[0];
    assert_eq!((e.critical, e.high, e.medium, e.low, e.negligible), (1, 1, 1, 1, 1));
}

#[tokio::test]
async fn test_persist_then_query_latest() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path().join("rumble"), "scans", "vulns");
    let report = ScanReport::parse(ScannerKind::Grype, &fixture("grype.json")).unwrap();

    let mut older = normalize(&report, at(1), "alpine:3.18").unwrap();
    let mut newer = normalize(&report, at(2), "alpine:3.18").unwrap();
    assert_eq!(persist_scan(&store, &mut older, &report).await.unwrap(), 6);
    assert_eq!(persist_scan(&store, &mut newer, &report).await.unwrap(), 6);
    assert_ne!(older.id, newer.id);

    let rows = store.fetch_scans(ScannerKind::Grype).await.unwrap().rows;
    assert_eq!(rows.len(), 2);
    assert!(store.fetch_scans(ScannerKind::Trivy).await.unwrap().rows.is_empty());

    let latest = select_latest(rows);
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, newer.id);

    let vulns = tokio::fs::read_to_string(store.vulns_path()).await.unwrap();
    assert_eq!(vulns.lines().count(), 12);
}

#[tokio::test]
async fn test_persist_scan_without_vulnerabilities_writes_no_vuln_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path(), "scans", "vulns");
    let json = br#"{"matches": [], "source": {"target": {"repoDigests": ["distroless@sha256:1"]}},
        "descriptor": {"version": "0.73.4"}}"#;
    let report = ScanReport::parse(ScannerKind::Grype, json).unwrap();
    let mut summary = normalize(&report, at(1), "distroless").unwrap();

    assert_eq!(persist_scan(&store, &mut summary, &report).await.unwrap(), 0);
    assert!(!summary.id.is_empty());
    assert!(!store.vulns_path().exists());
    assert_eq!(store.fetch_scans(ScannerKind::Grype).await.unwrap().rows.len(), 1);
}

#[tokio::test]
async fn test_query_latest_reports_around_unreadable_line() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path(), "scans", "vulns");
    store.append_scan(&row("alpine:3.19", at(1), 1, 0)).await.unwrap();
    store.append_scan(&row("alpine:3.19", at(2), 2, 0)).await.unwrap();
    store.append_scan(&row("python:3.12", at(1), 0, 4)).await.unwrap();

    let mut content = tokio::fs::read_to_string(store.scans_path()).await.unwrap();
    content.push_str("{\"id\":\"half-written\",\"image\":\"nginx:1\",\"scanner\":\"grype\"\n");
    tokio::fs::write(store.scans_path(), content).await.unwrap();

    let report = query_latest(&store, ScannerKind::Grype).await.unwrap();

    assert_eq!(report.processed, 2);
    let images: Vec<_> = report.entries.iter().map(|e| e.image.as_str()).collect();
    assert_eq!(images, ["alpine:3.19", "python:3.12"]);
    assert_eq!(report.entries[0].critical, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].row_id, "scans:4");
    assert!(report.failures[0].reason.contains("line 4"));

    let trivy = query_latest(&store, ScannerKind::Trivy).await.unwrap();
    assert_eq!(trivy.processed, 0);
    assert_eq!(trivy.failures.len(), 1, "scanner of a truncated line is unknown");
}
