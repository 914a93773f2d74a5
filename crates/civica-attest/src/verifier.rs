//! Allow-list verification of presented attestation tokens.
//!
//! # Security
//!
//! The verifier is deny-by-default: a token is accepted only when it
//! decodes and its code measurement matches the configured allow-list.
//! Mock tokens are rejected unless `allow_mock` is set, which exists for
//! local development only.

use crate::{
    claims::AttestationClaims,
    error::VerifyError,
    parser,
    token::parse_mock_token,
};

/// Verification policy, fixed at proxy startup.
#[derive(Debug, Clone, Default)]
pub struct VerifierPolicy {
    /// Code measurements (image digests or PCR0 hex) accepted as
    /// trusted. An empty list rejects every real token.
    pub allowed_measurements: Vec<String>,
    /// Accept labeled mock tokens. Development only.
    pub allow_mock: bool,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAttestation {
    /// The measurement that matched the allow-list, or `"mock"`
    pub measurement: String,
    /// Whether this was a mock token accepted under `allow_mock`
    pub mock: bool,
}

/// Verifies attestation tokens against an allow-list policy.
#[derive(Debug, Clone)]
pub struct AttestationVerifier {
    policy: VerifierPolicy,
}

impl AttestationVerifier {
    /// Create a verifier with `policy`.
    pub fn new(policy: VerifierPolicy) -> Self {
        if policy.allow_mock {
            tracing::warn!("verifier accepts mock attestation tokens; never enable in production");
        }
        Self { policy }
    }

    /// Verify a presented token.
    ///
    /// # Errors
    ///
    /// [`VerifyError::MissingToken`] for an empty token,
    /// [`VerifyError::MeasurementNotAllowed`] when the decoded
    /// measurement is not in the allow-list,
    /// [`VerifyError::MockNotPermitted`] for a mock token under a
    /// non-mock policy, and [`VerifyError::Undecodable`] otherwise.
    pub fn verify(&self, raw: &[u8]) -> Result<VerifiedAttestation, VerifyError> {
        if raw.is_empty() {
            return Err(VerifyError::MissingToken);
        }

        match parser::parse(raw) {
            Ok(claims) => self.check_measurement(&claims),
            Err(parse_err) => {
                // Not a real document. A labeled mock token is a policy
                // question; anything else is undecodable.
                if parse_mock_token(raw).is_some() {
                    if self.policy.allow_mock {
                        tracing::warn!("accepting mock attestation token per policy");
                        return Ok(VerifiedAttestation {
                            measurement: "mock".to_string(),
                            mock: true,
                        });
                    }
                    return Err(VerifyError::MockNotPermitted);
                }
                Err(VerifyError::Undecodable(parse_err))
            },
        }
    }

    fn check_measurement(
        &self,
        claims: &AttestationClaims,
    ) -> Result<VerifiedAttestation, VerifyError> {
        if self.policy.allowed_measurements.iter().any(|m| *m == claims.image_digest) {
            tracing::debug!(measurement = %claims.image_digest, "attestation accepted");
            return Ok(VerifiedAttestation { measurement: claims.image_digest.clone(), mock: false });
        }
        tracing::warn!(measurement = %claims.image_digest, "attestation measurement not allowed");
        Err(VerifyError::MeasurementNotAllowed { measurement: claims.image_digest.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ParseError, parser::testkit, token::build_mock_token};

    fn verifier(measurements: &[&str], allow_mock: bool) -> AttestationVerifier {
        AttestationVerifier::new(VerifierPolicy {
            allowed_measurements: measurements.iter().map(|s| s.to_string()).collect(),
            allow_mock,
        })
    }

    #[test]
    fn empty_token_is_missing() {
        let err = verifier(&["sha256:aa"], false).verify(b"").unwrap_err();
        assert_eq!(err, VerifyError::MissingToken);
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn allowed_identity_token_passes() {
        let token = testkit::encode_identity_token(&serde_json::json!({
            "iat": 1, "image_digest": "sha256:aa"
        }));

        let result = verifier(&["sha256:aa", "sha256:bb"], false).verify(&token).unwrap();
        assert_eq!(result.measurement, "sha256:aa");
        assert!(!result.mock);
    }

    #[test]
    fn unlisted_measurement_is_403() {
        let token = testkit::encode_identity_token(&serde_json::json!({
            "iat": 1, "image_digest": "sha256:evil"
        }));

        let err = verifier(&["sha256:aa"], false).verify(&token).unwrap_err();
        assert_eq!(err, VerifyError::MeasurementNotAllowed { measurement: "sha256:evil".into() });
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn allowed_cose_document_passes() {
        let pcr0 = vec![0x11; 48];
        let document = testkit::encode_document(&pcr0, "i-77-enc", 1_000);
        let measurement = hex::encode(&pcr0);

        let result = verifier(&[measurement.as_str()], false).verify(&document).unwrap();
        assert_eq!(result.measurement, hex::encode(&pcr0));
    }

    #[test]
    fn empty_allow_list_rejects_real_tokens() {
        let token = testkit::encode_identity_token(&serde_json::json!({
            "iat": 1, "image_digest": "sha256:aa"
        }));
        let err = verifier(&[], false).verify(&token).unwrap_err();
        assert!(matches!(err, VerifyError::MeasurementNotAllowed { .. }));
    }

    #[test]
    fn mock_rejected_by_default() {
        let mock = build_mock_token(b"pk", 1);
        let err = verifier(&["sha256:aa"], false).verify(&mock.raw).unwrap_err();
        assert_eq!(err, VerifyError::MockNotPermitted);
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn mock_accepted_when_policy_allows() {
        let mock = build_mock_token(b"pk", 1);
        let result = verifier(&[], true).verify(&mock.raw).unwrap();
        assert_eq!(result.measurement, "mock");
        assert!(result.mock);
    }

    #[test]
    fn garbage_is_undecodable_even_with_mock_allowed() {
        let err = verifier(&[], true).verify(b"\x00\x01garbage").unwrap_err();
        assert!(matches!(err, VerifyError::Undecodable(ParseError::UnrecognizedEncoding { .. })));
    }
}
