//! Fuzz target for pulling a JSON object out of model output.

#![no_main]

use arbitrary::Arbitrary;
use herbgarden::extract_json_object;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct ModelOutput<'a> {
    prefix: &'a str,
    body: &'a str,
    suffix: &'a str,
}

fuzz_target!(|input: ModelOutput| {
    let text = format!("{}{}{}", input.prefix, input.body, input.suffix);
    if let Some(object) = extract_json_object(&text) {
        // Whatever comes back must be a real object that re-encodes
        let encoded = serde_json::to_string(&object).unwrap_or_default();
        assert!(encoded.starts_with('{'));
    }
});
