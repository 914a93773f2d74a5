//! Platform-specific attestation issuance.

use std::time::Duration;

use crate::{
    claims::AttestationClaims,
    error::AttestationError,
    nsm::NsmDevice,
    parser,
    provider::Provider,
    token::{AttestationToken, build_mock_token},
};

/// GCP metadata identity-token path, relative to the metadata base URL.
const GCP_IDENTITY_PATH: &str =
    "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Azure IMDS attested-document path, relative to the metadata base URL.
const AZURE_ATTESTED_PATH: &str = "/metadata/attested/document?api-version=2021-02-01";

/// Issuer configuration.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Base URL of the local metadata endpoint (cloud identity
    /// platforms). The default is the link-local metadata address; tests
    /// point this at a stub server.
    pub metadata_base_url: String,
    /// Audience embedded in requested identity tokens
    pub audience: String,
    /// Per-request timeout against the metadata endpoint
    pub timeout: Duration,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            metadata_base_url: "http://169.254.169.254".to_string(),
            audience: "civica-delivery-pipeline".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Issues attestation tokens for the platform detected at startup.
///
/// Construct once per process; each [`issue`](Self::issue) call produces
/// a fresh token. Tokens are never cached across unrelated requests.
pub struct AttestationIssuer {
    provider: Provider,
    config: IssuerConfig,
    http: reqwest::Client,
    /// Open NSM session, present only inside a Nitro enclave
    nsm: Option<NsmDevice>,
}

impl AttestationIssuer {
    /// Create an issuer for `provider`.
    ///
    /// Inside a Nitro enclave this opens the NSM session immediately so
    /// a broken driver surfaces at startup, not on the first request.
    pub fn new(provider: Provider, config: IssuerConfig) -> Result<Self, AttestationError> {
        let nsm = match provider {
            Provider::AwsNitro => Some(NsmDevice::open()?),
            _ => None,
        };
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AttestationError::MetadataEndpoint)?;

        if provider == Provider::Mock {
            tracing::warn!("attestation issuer running in mock mode; tokens carry no guarantees");
        }

        Ok(Self { provider, config, http, nsm })
    }

    /// The platform this issuer serves.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Request a fresh attestation token binding `public_key`.
    ///
    /// The `issued_at_secs` argument is the caller's wall clock; it is
    /// used only for the mock token label (real platforms timestamp
    /// their own documents).
    pub async fn issue(
        &self,
        public_key: &[u8],
        issued_at_secs: u64,
    ) -> Result<AttestationToken, AttestationError> {
        match self.provider {
            Provider::Mock => {
                tracing::warn!("issuing mock attestation token");
                Ok(build_mock_token(public_key, issued_at_secs))
            },
            Provider::AwsNitro => self.issue_nitro(public_key),
            Provider::Gcp => {
                let url = format!(
                    "{}{}?audience={}&format=full",
                    self.config.metadata_base_url, GCP_IDENTITY_PATH, self.config.audience
                );
                self.issue_identity_token(Provider::Gcp, &url, "Metadata-Flavor", "Google", public_key)
                    .await
            },
            Provider::Azure => {
                let url =
                    format!("{}{}", self.config.metadata_base_url, AZURE_ATTESTED_PATH);
                self.issue_identity_token(Provider::Azure, &url, "Metadata", "true", public_key)
                    .await
            },
        }
    }

    fn issue_nitro(&self, public_key: &[u8]) -> Result<AttestationToken, AttestationError> {
        let nsm = self
            .nsm
            .as_ref()
            .ok_or_else(|| AttestationError::Nsm { reason: "NSM session not open".to_string() })?;
        let document = nsm.attestation_document(public_key)?;

        // Raw document only; claims are decoded by the verifier.
        Ok(AttestationToken { provider: Provider::AwsNitro, raw: document, claims: None })
    }

    /// Fetch a three-part signed identity token from the local metadata
    /// endpoint and decode its claims client-side. The supplied public
    /// key is recorded in the decoded claims so callers can confirm the
    /// binding they asked for.
    async fn issue_identity_token(
        &self,
        provider: Provider,
        url: &str,
        header_name: &'static str,
        header_value: &'static str,
        public_key: &[u8],
    ) -> Result<AttestationToken, AttestationError> {
        let response = self.http.get(url).header(header_name, header_value).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttestationError::MetadataStatus { status: status.as_u16() });
        }

        let raw = response.text().await?.trim().to_string();
        let mut claims = decode_identity_claims(&raw)?;
        claims.public_key = Some(public_key.to_vec());

        Ok(AttestationToken { provider, raw: raw.into_bytes(), claims: Some(claims) })
    }
}

/// Decode the payload segment of a three-part signed token.
fn decode_identity_claims(token: &str) -> Result<AttestationClaims, AttestationError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AttestationError::TokenFormat {
            reason: format!("expected 3 segments, got {}", segments.len()),
        });
    }

    parser::parse(token.as_bytes())
        .map_err(|err| AttestationError::TokenFormat { reason: err.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::parse_mock_token;

    #[tokio::test]
    async fn mock_issuer_labels_tokens() {
        let issuer = AttestationIssuer::new(Provider::Mock, IssuerConfig::default()).unwrap();
        let token = issuer.issue(b"enclave-public-key", 1_700_000_123).await.unwrap();

        assert_eq!(token.provider, Provider::Mock);
        let claims = parse_mock_token(&token.raw).expect("labeled mock token");
        assert_eq!(claims.issued_at_secs, 1_700_000_123);
        assert_eq!(claims.public_key.as_deref(), Some(b"enclave-public-key".as_slice()));
    }

    #[tokio::test]
    async fn mock_issuer_reports_claims_client_side() {
        let issuer = AttestationIssuer::new(Provider::Mock, IssuerConfig::default()).unwrap();
        let token = issuer.issue(b"pk", 7).await.unwrap();
        assert!(token.claims.is_some());
    }

    #[test]
    fn identity_claims_require_three_segments() {
        let err = decode_identity_claims("only.two").unwrap_err();
        assert!(matches!(err, AttestationError::TokenFormat { .. }));
    }

    #[test]
    fn identity_claims_decode_via_parser() {
        let token = crate::parser::testkit::encode_identity_token(&serde_json::json!({
            "iat": 9,
            "image_digest": "sha256:01"
        }));
        let claims = decode_identity_claims(std::str::from_utf8(&token).unwrap()).unwrap();
        assert_eq!(claims.image_digest, "sha256:01");
    }
}
