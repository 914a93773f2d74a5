//! Relay logic: verify attestation, check the target, forward verbatim.
//!
//! # Security
//!
//! The body is opaque to the proxy. It is relayed byte-for-byte to the
//! verified target and never logged, parsed, or stored. Verification
//! failures return before the body is touched.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use civica_attest::{AttestationVerifier, VerifiedAttestation, VerifierPolicy, VerifyError};

use crate::error::ProxyError;

/// The proxy's per-process state.
#[derive(Debug, Clone)]
pub struct ProxyService {
    verifier: AttestationVerifier,
    allowed_hosts: Vec<String>,
    http: reqwest::Client,
}

impl ProxyService {
    /// Build the service.
    ///
    /// `allowed_hosts` is the fixed set of hosts `X-Target-Endpoint` may
    /// name; anything else is refused regardless of attestation.
    pub fn new(
        policy: VerifierPolicy,
        allowed_hosts: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProxyError::Upstream { reason: err.to_string() })?;
        Ok(Self { verifier: AttestationVerifier::new(policy), allowed_hosts, http })
    }

    /// Verify the `X-Attestation-Token` header value.
    ///
    /// The enclave sends the token base64-encoded; a value that is not
    /// base64 is passed to the verifier as-is so raw identity tokens
    /// also work.
    pub fn verify_token(&self, header: Option<&[u8]>) -> Result<VerifiedAttestation, VerifyError> {
        let raw = header.ok_or(VerifyError::MissingToken)?;
        let decoded = STANDARD.decode(raw).unwrap_or_else(|_| raw.to_vec());
        self.verifier.verify(&decoded)
    }

    /// Validate `X-Target-Endpoint` against the host allow-list.
    pub fn check_target(&self, endpoint: &str) -> Result<reqwest::Url, ProxyError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|err| ProxyError::InvalidTarget { reason: err.to_string() })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidTarget {
                reason: format!("unsupported scheme: {}", url.scheme()),
            });
        }
        let host = url
            .host_str()
            .ok_or_else(|| ProxyError::InvalidTarget { reason: "no host".to_string() })?;

        if !self.allowed_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)) {
            tracing::warn!(%host, "refusing relay to non-allow-listed host");
            return Err(ProxyError::TargetNotAllowed { host: host.to_string() });
        }
        Ok(url)
    }

    /// Relay the body to a checked target, returning the upstream status
    /// and body verbatim.
    pub async fn relay(
        &self,
        target: reqwest::Url,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<(u16, Bytes), ProxyError> {
        let mut request = self.http.post(target);
        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|err| ProxyError::Upstream { reason: err.to_string() })?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| ProxyError::Upstream { reason: err.to_string() })?;

        tracing::info!(status, bytes = body.len(), "relay completed");
        Ok((status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civica_attest::parser::testkit;

    fn service(measurements: &[&str], allow_mock: bool) -> ProxyService {
        ProxyService::new(
            VerifierPolicy {
                allowed_measurements: measurements.iter().map(|s| s.to_string()).collect(),
                allow_mock,
            },
            vec!["cwc.example.gov".to_string()],
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn missing_header_is_missing_token() {
        let err = service(&[], false).verify_token(None).unwrap_err();
        assert_eq!(err, VerifyError::MissingToken);
    }

    #[test]
    fn base64_wrapped_token_verifies() {
        let token = testkit::encode_identity_token(&serde_json::json!({
            "iat": 1, "image_digest": "sha256:aa"
        }));
        let header = STANDARD.encode(&token);

        let verified =
            service(&["sha256:aa"], false).verify_token(Some(header.as_bytes())).unwrap();
        assert_eq!(verified.measurement, "sha256:aa");
    }

    #[test]
    fn raw_token_verifies_without_base64() {
        let token = testkit::encode_identity_token(&serde_json::json!({
            "iat": 1, "image_digest": "sha256:aa"
        }));

        let verified = service(&["sha256:aa"], false).verify_token(Some(&token)).unwrap();
        assert_eq!(verified.measurement, "sha256:aa");
    }

    #[test]
    fn allowed_host_passes_case_insensitively() {
        let service = service(&[], false);
        assert!(service.check_target("https://CWC.example.gov/v2/message").is_ok());
    }

    #[test]
    fn unknown_host_is_refused() {
        let err = service(&[], false).check_target("https://evil.example/steal").unwrap_err();
        assert!(matches!(err, ProxyError::TargetNotAllowed { ref host } if host == "evil.example"));
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn non_http_scheme_is_invalid() {
        let err = service(&[], false).check_target("ftp://cwc.example.gov/x").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidTarget { .. }));
    }

    #[test]
    fn unparseable_target_is_invalid() {
        let err = service(&[], false).check_target("not a url").unwrap_err();
        assert_eq!(err.http_status(), 400);
    }
}
