//! Fuzz target for the channel frame decoder
//!
//! Arbitrary text must never panic the decoder. Frames that decode and
//! re-encode must decode to the same frame again.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomsync_core::wire;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(frame) = wire::decode(text) else {
        return;
    };

    let Ok(reencoded) = serde_json::to_string(&frame) else {
        return;
    };
    if let Ok(again) = wire::decode(&reencoded) {
        assert_eq!(frame, again);
    }
});
