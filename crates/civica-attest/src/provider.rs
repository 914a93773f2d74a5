//! Runtime platform detection.

use std::path::Path;

/// Attestation platform the process is running on.
///
/// Selected once at startup via [`Provider::detect`] and threaded through
/// the issuer, instead of scattering platform conditionals at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// GCP Confidential Space: signed identity token from the local
    /// metadata endpoint
    Gcp,
    /// Azure confidential VM: attested identity token from IMDS
    Azure,
    /// AWS Nitro Enclave: binary CBOR/COSE document from the NSM device
    AwsNitro,
    /// No recognized platform (local/dev); issues labeled mock tokens
    /// that no production verifier accepts
    Mock,
}

/// Environment variable overriding detection, for tests and local runs.
const PROVIDER_OVERRIDE_ENV: &str = "ATTESTATION_PROVIDER";

/// NSM character device present inside a Nitro enclave.
const NSM_DEVICE_PATH: &str = "/dev/nsm";

impl Provider {
    /// Probe the runtime environment.
    ///
    /// Order: explicit `ATTESTATION_PROVIDER` override, the NSM device,
    /// GCP metadata signals, Azure signals, then [`Provider::Mock`] with
    /// a warning.
    pub fn detect() -> Self {
        if let Ok(name) = std::env::var(PROVIDER_OVERRIDE_ENV) {
            if let Some(provider) = Self::from_name(&name) {
                return provider;
            }
            tracing::warn!(value = %name, "ignoring unrecognized ATTESTATION_PROVIDER override");
        }

        if Path::new(NSM_DEVICE_PATH).exists() {
            return Self::AwsNitro;
        }
        if std::env::var("GCE_METADATA_HOST").is_ok()
            || std::env::var("GOOGLE_CLOUD_PROJECT").is_ok()
        {
            return Self::Gcp;
        }
        if std::env::var("AZURE_ENVIRONMENT").is_ok() || std::env::var("MSI_ENDPOINT").is_ok() {
            return Self::Azure;
        }

        tracing::warn!("no attestation platform detected, falling back to mock tokens");
        Self::Mock
    }

    /// Parse a provider name (CLI/env spelling).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gcp" => Some(Self::Gcp),
            "azure" => Some(Self::Azure),
            "aws-nitro" | "nitro" => Some(Self::AwsNitro),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    /// Lowercase wire name used in the attestation endpoint response.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gcp => "gcp",
            Self::Azure => "azure",
            Self::AwsNitro => "aws-nitro",
            Self::Mock => "mock",
        }
    }
}
