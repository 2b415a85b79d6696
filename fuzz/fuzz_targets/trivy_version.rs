#![no_main]

use libfuzzer_sys::fuzz_target;
use rumble_scanner::ScannerVersion;
use rumble_scanner::report::trivy::TrivyVersion;

fuzz_target!(|data: &[u8]| {
    if let Ok(version) = TrivyVersion::parse(data) {
        let _ = ScannerVersion::from(version);
    }
});
