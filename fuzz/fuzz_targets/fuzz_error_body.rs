#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let status = u16::from_be_bytes([data[0], data[1]]);
    if let Ok(body) = std::str::from_utf8(&data[2..]) {
        let err = cardwise::core::ApiError::from_status(status, body);
        let _ = err.user_message();
        let _ = err.technical_detail();
    }
});
