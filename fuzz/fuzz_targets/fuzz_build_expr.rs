#![no_main]

use libfuzzer_sys::fuzz_target;
use plotexpr::build_expr;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    if let Ok(expr) = build_expr(&value) {
        // Display must not panic on any tree the builder accepts.
        let _ = expr.to_string();
    }
});
