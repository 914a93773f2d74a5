//! Decoded attestation claims.

use serde::{Deserialize, Serialize};

/// Claims recovered from an attestation document or identity token.
///
/// This is the only shape the rest of the pipeline sees; encoding
/// details stay inside [`crate::parser`] and the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationClaims {
    /// Code measurement: PCR0 hex for hardware enclaves, the container
    /// image digest for cloud identity platforms
    pub image_digest: String,
    /// Hardware class the workload ran on (e.g. `aws-nitro`,
    /// `GCP_AMD_SEV`)
    pub hardware_class: String,
    /// Platform software version, when the platform reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    /// Instance identity (module id, instance id), when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_identity: Option<String>,
    /// Issuance time, seconds since the Unix epoch
    pub issued_at_secs: u64,
    /// Application public key bound into the attestation, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<Vec<u8>>,
}
