//! Attestation document decoding.
//!
//! The single module that understands attestation encodings. Everything
//! downstream (verifier allow-list logic, the proxy) works with
//! [`AttestationClaims`] and never touches CBOR or token segments.
//!
//! Two encodings are recognized:
//!
//! - Nested CBOR/COSE hardware documents (`COSE_Sign1` outer array,
//!   CBOR map payload with a PCR map) as produced by the NSM device
//! - Three-part signed identity tokens from cloud metadata endpoints
//!   (claims decoded from the base64url payload segment)
//!
//! Labeled mock tokens are deliberately NOT handled here; accepting them
//! is a verifier policy decision, see [`crate::AttestationVerifier`].

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ciborium::value::{Integer, Value};

use crate::{claims::AttestationClaims, error::ParseError};

/// Decode an attestation document or identity token into claims.
///
/// # Errors
///
/// [`ParseError::UnrecognizedEncoding`] when the bytes match neither
/// supported scheme; [`ParseError::MissingMeasurement`] when a document
/// decodes but carries no code measurement.
pub fn parse(bytes: &[u8]) -> Result<AttestationClaims, ParseError> {
    if let Some(payload) = identity_token_payload(bytes) {
        return claims_from_identity_payload(&payload);
    }
    parse_cose_document(bytes)
}

/// Extract the JSON payload of a three-part signed token, if `bytes`
/// looks like one.
fn identity_token_payload(bytes: &[u8]) -> Option<serde_json::Value> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut segments = text.trim().split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Map identity-token claims to [`AttestationClaims`].
///
/// GCP Confidential Space nests the container image digest under
/// `submods.container.image_digest`; a flat `image_digest` claim is
/// accepted as the fallback spelling.
pub(crate) fn claims_from_identity_payload(
    payload: &serde_json::Value,
) -> Result<AttestationClaims, ParseError> {
    let image_digest = payload
        .pointer("/submods/container/image_digest")
        .or_else(|| payload.get("image_digest"))
        .and_then(serde_json::Value::as_str)
        .ok_or(ParseError::MissingMeasurement)?
        .to_string();

    let hardware_class = payload
        .get("hwmodel")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let software_version = payload.get("swversion").and_then(|v| match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            items.first().and_then(serde_json::Value::as_str).map(str::to_string)
        },
        _ => None,
    });

    let instance_identity = payload
        .pointer("/google/compute_engine/instance_id")
        .or_else(|| payload.get("sub"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    let issued_at_secs = payload.get("iat").and_then(serde_json::Value::as_u64).unwrap_or(0);

    Ok(AttestationClaims {
        image_digest,
        hardware_class,
        software_version,
        instance_identity,
        issued_at_secs,
        public_key: None,
    })
}

/// Decode a nested CBOR/COSE hardware attestation document.
fn parse_cose_document(bytes: &[u8]) -> Result<AttestationClaims, ParseError> {
    let outer: Value = ciborium::de::from_reader(bytes)
        .map_err(|err| ParseError::UnrecognizedEncoding { reason: err.to_string() })?;

    // COSE_Sign1 is commonly wrapped in tag 18.
    let outer = match outer {
        Value::Tag(_, inner) => *inner,
        other => other,
    };

    let Value::Array(items) = outer else {
        return Err(ParseError::UnrecognizedEncoding {
            reason: "expected COSE_Sign1 array".to_string(),
        });
    };
    if items.len() != 4 {
        return Err(ParseError::UnrecognizedEncoding {
            reason: format!("expected 4 COSE_Sign1 fields, got {}", items.len()),
        });
    }
    let Value::Bytes(payload) = &items[2] else {
        return Err(ParseError::UnrecognizedEncoding {
            reason: "COSE_Sign1 payload is not a byte string".to_string(),
        });
    };

    let doc: Value = ciborium::de::from_reader(payload.as_slice())
        .map_err(|err| ParseError::UnrecognizedEncoding { reason: err.to_string() })?;
    let Value::Map(entries) = doc else {
        return Err(ParseError::UnrecognizedEncoding {
            reason: "attestation payload is not a map".to_string(),
        });
    };

    let pcr0 = entries
        .iter()
        .find_map(|(key, value)| match (key, value) {
            (Value::Text(k), Value::Map(pcrs)) if k == "pcrs" => Some(pcrs),
            _ => None,
        })
        .and_then(|pcrs| {
            pcrs.iter().find_map(|(index, value)| match (index, value) {
                (Value::Integer(i), Value::Bytes(bytes)) if *i == Integer::from(0u8) => {
                    Some(bytes.clone())
                },
                _ => None,
            })
        })
        .ok_or(ParseError::MissingMeasurement)?;

    let module_id = map_text(&entries, "module_id");
    let timestamp_millis = map_u64(&entries, "timestamp").unwrap_or(0);
    let public_key = entries.iter().find_map(|(key, value)| match (key, value) {
        (Value::Text(k), Value::Bytes(bytes)) if k == "public_key" => Some(bytes.clone()),
        _ => None,
    });

    Ok(AttestationClaims {
        image_digest: hex::encode(pcr0),
        hardware_class: "aws-nitro".to_string(),
        software_version: map_text(&entries, "digest"),
        instance_identity: module_id,
        issued_at_secs: timestamp_millis / 1_000,
        public_key,
    })
}

fn map_text(entries: &[(Value, Value)], key: &str) -> Option<String> {
    entries.iter().find_map(|(k, v)| match (k, v) {
        (Value::Text(name), Value::Text(text)) if name == key => Some(text.clone()),
        _ => None,
    })
}

fn map_u64(entries: &[(Value, Value)], key: &str) -> Option<u64> {
    entries.iter().find_map(|(k, v)| match (k, v) {
        (Value::Text(name), Value::Integer(i)) if name == key => u64::try_from(i128::from(*i)).ok(),
        _ => None,
    })
}

/// Builders for fabricated attestation documents, for tests that need a
/// structurally valid document without enclave hardware.
#[cfg(any(test, feature = "testkit"))]
pub mod testkit {
    use super::{Integer, Value};
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    /// Encode a minimal COSE_Sign1 attestation document with the given
    /// PCR0 value. The signature is zero-filled; the parser does not
    /// verify signatures (that is the platform verifier service's job in
    /// deployments, behind the same allow-list policy).
    #[allow(clippy::expect_used)]
    pub fn encode_document(pcr0: &[u8], module_id: &str, timestamp_millis: u64) -> Vec<u8> {
        let payload_map = Value::Map(vec![
            (Value::Text("module_id".into()), Value::Text(module_id.into())),
            (Value::Text("digest".into()), Value::Text("SHA384".into())),
            (
                Value::Text("timestamp".into()),
                Value::Integer(Integer::from(timestamp_millis)),
            ),
            (
                Value::Text("pcrs".into()),
                Value::Map(vec![
                    (Value::Integer(Integer::from(0u8)), Value::Bytes(pcr0.to_vec())),
                    (Value::Integer(Integer::from(1u8)), Value::Bytes(vec![0u8; 48])),
                    (Value::Integer(Integer::from(2u8)), Value::Bytes(vec![0u8; 48])),
                ]),
            ),
        ]);

        let mut payload = Vec::new();
        ciborium::ser::into_writer(&payload_map, &mut payload)
            .expect("CBOR encoding of an in-memory map cannot fail");

        let cose = Value::Tag(
            18,
            Box::new(Value::Array(vec![
                Value::Bytes(Vec::new()),
                Value::Map(Vec::new()),
                Value::Bytes(payload),
                Value::Bytes(vec![0u8; 96]),
            ])),
        );

        let mut document = Vec::new();
        ciborium::ser::into_writer(&cose, &mut document)
            .expect("CBOR encoding of an in-memory value cannot fail");
        document
    }

    /// Encode a three-part identity token with the given JSON claims.
    /// The signature segment is placeholder bytes; see
    /// [`encode_document`] for the signature policy.
    pub fn encode_identity_token(payload: &serde_json::Value) -> Vec<u8> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(b"test-signature");
        format!("{header}.{body}.{signature}").into_bytes()
    }
}
