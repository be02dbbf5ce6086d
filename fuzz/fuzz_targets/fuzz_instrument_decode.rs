#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must not panic on arbitrary backend payloads.
    let _ = serde_json::from_slice::<Vec<cardwise::core::Instrument>>(data);
    let _ = serde_json::from_slice::<cardwise::core::BalanceSnapshot>(data);
});
