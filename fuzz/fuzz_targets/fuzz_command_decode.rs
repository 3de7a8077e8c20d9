#![no_main]
use libfuzzer_sys::fuzz_target;
use monkey_types::{Command, CommandKind};

// Oracle responses are untrusted: decoding must reject, never panic, and a
// decoded command must be one the wire is allowed to carry.
fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 {
        return;
    }
    if let Ok(command) = Command::decode(data) {
        assert!(!matches!(command.kind(), CommandKind::Start | CommandKind::Stop));
        let encoded = serde_json::to_vec(&command).expect("commands serialize");
        assert_eq!(Command::decode(&encoded).ok(), Some(command));
    }
});
