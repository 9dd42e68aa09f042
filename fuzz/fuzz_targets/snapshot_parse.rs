#![no_main]

use heirloom_core::{Address, ManualClock};
use heirloom_engine::{Ledger, LedgerConfig, LedgerSnapshot};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    // A stored snapshot is untrusted input: decoding and restoring it must
    // return Ok or Err, never panic.
    if let Ok(snapshot) = serde_json::from_slice::<LedgerSnapshot>(data) {
        let config = LedgerConfig {
            admin: Address::from_low_u8(0xAD),
            ..LedgerConfig::default()
        };
        if let Ok(ledger) =
            Ledger::from_snapshot(snapshot, &config, Arc::new(ManualClock::new(0)))
        {
            let _ = ledger.due_wills();
            let _ = ledger.heartbeat_statuses();
            let _ = serde_json::to_vec(&ledger.snapshot());
        }
    }
});
