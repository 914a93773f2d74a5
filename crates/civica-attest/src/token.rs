//! Attestation token container and the labeled mock format.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{claims::AttestationClaims, provider::Provider};

/// Warning text embedded in every mock token. Verifiers check the label,
/// not this text, but the text makes a leaked mock token self-explaining.
pub const MOCK_WARNING: &str =
    "mock attestation token - no isolation guarantees - must never be accepted in production";

/// A freshly issued attestation token.
///
/// `raw` is what goes on the wire (`X-Attestation-Token`); its format
/// depends on the provider. Claims are decoded client-side for identity
/// tokens and mock tokens; for NSM documents only the verifier decodes.
#[derive(Debug, Clone)]
pub struct AttestationToken {
    /// Platform that produced the proof
    pub provider: Provider,
    /// Opaque encoded token
    pub raw: Vec<u8>,
    /// Decoded claims, when decoded client-side
    pub claims: Option<AttestationClaims>,
}

/// Wire shape of a mock token.
#[derive(Debug, Serialize, Deserialize)]
struct MockToken {
    mock: bool,
    warning: String,
    issued_at_secs: u64,
    /// Base64 of the bound public key
    public_key: String,
}

/// Build a labeled mock token binding `public_key`.
pub fn build_mock_token(public_key: &[u8], issued_at_secs: u64) -> AttestationToken {
    let body = MockToken {
        mock: true,
        warning: MOCK_WARNING.to_string(),
        issued_at_secs,
        public_key: STANDARD.encode(public_key),
    };
    // Serialization of a plain struct with string fields cannot fail.
    let raw = serde_json::to_vec(&body).unwrap_or_default();

    AttestationToken {
        provider: Provider::Mock,
        raw,
        claims: Some(AttestationClaims {
            image_digest: "mock".to_string(),
            hardware_class: "none".to_string(),
            software_version: None,
            instance_identity: None,
            issued_at_secs,
            public_key: Some(public_key.to_vec()),
        }),
    }
}

/// Check whether `raw` is a labeled mock token.
///
/// Returns the decoded claims when it is. Anything without the explicit
/// `mock: true` label is not a mock token, even if it happens to be
/// JSON.
pub fn parse_mock_token(raw: &[u8]) -> Option<AttestationClaims> {
    let token: MockToken = serde_json::from_slice(raw).ok()?;
    if !token.mock {
        return None;
    }
    let public_key = STANDARD.decode(&token.public_key).ok();

    Some(AttestationClaims {
        image_digest: "mock".to_string(),
        hardware_class: "none".to_string(),
        software_version: None,
        instance_identity: None,
        issued_at_secs: token.issued_at_secs,
        public_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_token_roundtrip() {
        let token = build_mock_token(b"pubkey-bytes", 1_700_000_000);
        assert_eq!(token.provider, Provider::Mock);

        let claims = parse_mock_token(&token.raw).expect("mock token should parse");
        assert_eq!(claims.image_digest, "mock");
        assert_eq!(claims.issued_at_secs, 1_700_000_000);
        assert_eq!(claims.public_key.as_deref(), Some(b"pubkey-bytes".as_slice()));
    }

    #[test]
    fn mock_token_carries_warning() {
        let token = build_mock_token(b"pk", 0);
        let text = String::from_utf8(token.raw).unwrap();
        assert!(text.contains("must never be accepted in production"));
    }

    #[test]
    fn unlabeled_json_is_not_a_mock_token() {
        assert!(parse_mock_token(br#"{"hello": "world"}"#).is_none());
        assert!(parse_mock_token(b"\x84\x43foo").is_none());
    }

    #[test]
    fn mock_false_label_is_rejected() {
        let raw = br#"{"mock": false, "warning": "w", "issued_at_secs": 1, "public_key": ""}"#;
        assert!(parse_mock_token(raw).is_none());
    }
}
