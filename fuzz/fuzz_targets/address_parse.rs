#![no_main]

use heirloom_core::{Address, Digest};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing must return Ok or Err, never panic. Anything that parses must
    // render back to a string that parses to the same value.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(address) = s.parse::<Address>() {
            assert_eq!(address.to_string().parse::<Address>().ok(), Some(address));
        }
        if let Ok(digest) = s.parse::<Digest>() {
            assert_eq!(digest.to_string().parse::<Digest>().ok(), Some(digest));
        }

        let prefixed = format!("0x{}", s);
        let _ = prefixed.parse::<Address>();
        let _ = prefixed.parse::<Digest>();
    }
});
