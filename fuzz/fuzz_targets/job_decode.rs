//! Fuzz target for queue job decoding and response scanning
//!
//! This fuzzer exercises the two places untrusted text enters the
//! workers: the queued job JSON and the upstream response body the
//! confirmation id is scanned out of.
//!
//! Neither path should ever panic; malformed jobs must return an error
//! and malformed responses must yield no confirmation id.

#![no_main]

use civica_core::SubmissionJob;
use civica_delivery::wire::extract_confirmation_id;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else { return };

    let _ = SubmissionJob::from_json(text);
    let _ = extract_confirmation_id(text);
});
