#![no_main]

use libfuzzer_sys::fuzz_target;

use rumble_scanner::report::compact_json;
use rumble_scanner::{ScanReport, ScannerKind, normalize};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let kind = if selector % 2 == 0 {
        ScannerKind::Grype
    } else {
        ScannerKind::Trivy
    };

    // 압축 결과는 원본과 같은 JSON 값이어야 한다
    if let Ok(compact) = compact_json(kind.as_str(), body) {
        let original: serde_json::Value =
            serde_json::from_slice(body).expect("compact_json accepted invalid JSON");
        let reparsed: serde_json::Value =
            serde_json::from_str(&compact).expect("compacted report must be valid JSON");
        assert_eq!(original, reparsed);
    }

    if let Ok(report) = ScanReport::parse(kind, body) {
        if let Ok(summary) = normalize(&report, chrono::Utc::now(), "fuzz:latest") {
            // 총계는 버킷 합계 이상 (알 수 없는 심각도는 총계에만 들어간다)
            assert!(summary.total >= summary.counts.bucketed_total());
        }
    }
});
