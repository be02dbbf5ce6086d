#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let primary = cardwise::core::is_valid_tax_id_primary(s);
        let secondary = cardwise::core::is_valid_tax_id_secondary(s);
        // A value can never be valid in both forms.
        assert!(!(primary && secondary));
        if primary || secondary {
            assert!(cardwise::core::classify_tax_id(s).is_some());
        }
    }
});
