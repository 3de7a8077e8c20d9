#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary documents either compile or fail with a CompileError. Whatever
// compiles is closed over its schema table and compiles the same way twice.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 64_000 {
        return;
    }
    if let Ok(ir) = monkey_compiler::compile_str(text) {
        assert!(ir.is_closed());
        assert_eq!(monkey_compiler::compile_str(text).ok(), Some(ir));
    }
});
