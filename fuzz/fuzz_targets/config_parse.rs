//! Fuzz target for TOML config parsing.
//!
//! Malformed TOML must be rejected without panicking, and anything that
//! parses must survive validation.

#![no_main]

use herbgarden::Config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = toml::from_str::<Config>(s) {
            let _ = config.validate();
        }
    }
});
