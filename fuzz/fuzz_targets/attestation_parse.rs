//! Fuzz target for attestation document parsing
//!
//! This fuzzer feeds arbitrary byte sequences to the attestation parser
//! to find:
//! - Panics on malformed CBOR or base64url segments
//! - Integer overflows in length handling
//! - COSE structures that bypass shape validation
//!
//! The parser should NEVER panic. All invalid inputs should return an
//! error.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a token: not valid COSE, not a valid identity
    // token, or occasionally both shapes partially. Must never panic.
    let _ = civica_attest::parser::parse(data);
});
