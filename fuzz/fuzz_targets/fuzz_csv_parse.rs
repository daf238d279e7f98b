#![no_main]

use libfuzzer_sys::fuzz_target;
use px_io::{TableShape, read_csv_str, validate_table};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(frame) = read_csv_str(input) {
        assert_eq!(frame.index().len(), frame.len());
        let _ = validate_table(&frame, TableShape::any());
    }
});
