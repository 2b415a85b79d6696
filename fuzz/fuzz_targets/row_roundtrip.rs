#![no_main]

use arbitrary::Arbitrary;
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;

use rumble_scanner::row::{decode, encode};
use rumble_scanner::{ScanSummary, ScannerKind, SeverityCounts};

/// 퍼저용 구조적 요약 입력
#[derive(Arbitrary, Debug)]
struct FuzzSummary {
    trivy: bool,
    id: String,
    image: String,
    digest: String,
    scanner_version: String,
    scanner_db_version: String,
    time_secs: u32,
    created_secs: u32,
    counts: [u32; 6],
}

fuzz_target!(|input: FuzzSummary| {
    let kind = if input.trivy {
        ScannerKind::Trivy
    } else {
        ScannerKind::Grype
    };
    let Some(time) = DateTime::<Utc>::from_timestamp(i64::from(input.time_secs), 0) else {
        return;
    };
    let Some(created) = DateTime::<Utc>::from_timestamp(i64::from(input.created_secs), 0) else {
        return;
    };

    let [low, medium, high, critical, negligible, unknown] = input.counts.map(u64::from);
    let mut summary = ScanSummary::new(input.image, kind, time).with_created(created);
    summary.id = input.id;
    summary.digest = input.digest;
    summary.scanner_version = input.scanner_version;
    summary.scanner_db_version = input.scanner_db_version;
    summary.success = true;
    summary.counts = SeverityCounts {
        low,
        medium,
        high,
        critical,
        negligible,
        unknown,
    };
    summary.total = summary.counts.bucketed_total();

    // 원본 리포트가 없는 행은 항상 디코딩되어야 한다
    let (decoded, vulnerabilities) = decode(encode(&summary)).expect("empty report must decode");
    assert!(vulnerabilities.is_empty());
    assert_eq!(decoded, summary);
});
