#![no_main]

use libfuzzer_sys::fuzz_target;
use syncwatch_types::Snapshot;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(snapshot) = Snapshot::from_json(text) {
            let _ = snapshot.is_consistent();
            let _ = snapshot.remaining_estimate();
        }
    }
});
