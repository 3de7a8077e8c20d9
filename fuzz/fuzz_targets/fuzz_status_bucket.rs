#![no_main]
use libfuzzer_sys::fuzz_target;
use monkey_types::StatusBucket;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(bucket) = StatusBucket::parse(text) {
        let rendered = bucket.to_string();
        assert_eq!(StatusBucket::parse(&rendered), Ok(bucket));
        assert_eq!(StatusBucket::try_from(bucket.code()), Ok(bucket));
    }
});
