//! Decrypt-and-forward request handling.
//!
//! # Security
//!
//! Plaintext exists only inside [`DecryptionService::decrypt_and_forward`]:
//! decrypted bytes are parsed into the outbound payload and the buffer is
//! zeroized before the method returns. Plaintext is never logged, never
//! stored, and never included in an error response.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use civica_attest::{AttestationIssuer, AttestationToken};
use civica_core::Clock;
use civica_crypto::{EnclaveKeyPair, EncryptedEnvelope, NONCE_SIZE};
use civica_delivery::{DeliveryClient, wire::CwcPayload};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{error::EnclaveError, metrics::EnclaveMetrics};

/// Body of `POST /decrypt-and-forward`. Binary fields are base64.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecryptRequest {
    /// AEAD ciphertext with appended tag, base64
    pub ciphertext: String,
    /// 12-byte nonce, base64
    pub nonce: String,
    /// Sender's ephemeral SEC1 public key, base64
    pub ephemeral_public_key: String,
    /// Message template identifier
    pub template_id: String,
    /// Target office descriptor
    pub recipient: RecipientDescriptor,
}

/// Office the decrypted message is delivered to.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientDescriptor {
    /// Legislative office code
    pub office_code: String,
    /// Recipient display name
    pub name: String,
}

/// Message fields recovered from a decrypted envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptedMessage {
    subject: String,
    message: String,
    sender_name: String,
    sender_email: String,
    sender_address: String,
    #[serde(default)]
    sender_phone: Option<String>,
}

/// Successful response body of `POST /decrypt-and-forward`.
#[derive(Debug, Serialize)]
pub struct ForwardResponse {
    /// Always true on the success path
    pub success: bool,
    /// Upstream confirmation id
    pub cwc_confirmation: String,
    /// Base64 attestation document proving which image handled the
    /// plaintext
    pub attestation_document: String,
}

/// Response body of `GET /attestation`.
#[derive(Debug, Serialize)]
pub struct AttestationInfo {
    /// Platform name
    pub provider: String,
    /// Decoded claims, when available client-side
    pub claims: Option<civica_attest::AttestationClaims>,
    /// Base64 attestation document
    pub attestation_document: String,
    /// Issuance timestamp (unix seconds)
    pub timestamp: u64,
}

/// The enclave's request handler.
///
/// Holds the process key pair, the attestation issuer, and the upstream
/// delivery client. Immutable after construction; handlers share it
/// behind an [`Arc`] with no per-request locking.
pub struct DecryptionService<C: Clock> {
    keypair: EnclaveKeyPair,
    issuer: AttestationIssuer,
    delivery: DeliveryClient,
    metrics: Arc<EnclaveMetrics>,
    clock: C,
}

impl<C: Clock> DecryptionService<C> {
    /// Assemble the service.
    pub fn new(
        keypair: EnclaveKeyPair,
        issuer: AttestationIssuer,
        delivery: DeliveryClient,
        metrics: Arc<EnclaveMetrics>,
        clock: C,
    ) -> Self {
        Self { keypair, issuer, delivery, metrics, clock }
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> &Arc<EnclaveMetrics> {
        &self.metrics
    }

    /// Handle one decrypt-and-forward request.
    ///
    /// Returns the response body plus the raw attestation token for the
    /// `X-Attestation-Token` header.
    ///
    /// # Errors
    ///
    /// See [`EnclaveError`]; no variant carries plaintext.
    pub async fn decrypt_and_forward(
        &self,
        body: &[u8],
    ) -> Result<(ForwardResponse, String), EnclaveError> {
        let started = self.clock.now_millis();
        let request: DecryptRequest = serde_json::from_slice(body)
            .map_err(|err| EnclaveError::BadRequest { reason: err.to_string() })?;
        let envelope = decode_envelope(&request)?;

        let mut plaintext = match self.keypair.open(&envelope) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                self.metrics.record_decryption_error();
                tracing::warn!(template_id = %request.template_id, error = %err, "decryption failed");
                return Err(err.into());
            },
        };
        self.metrics.record_decryption();

        let message: DecryptedMessage = match serde_json::from_slice(&plaintext) {
            Ok(message) => message,
            Err(_) => {
                plaintext.zeroize();
                // Deliberately no serde detail: it could quote plaintext.
                return Err(EnclaveError::BadRequest {
                    reason: "decrypted payload is not a valid message".to_string(),
                });
            },
        };
        plaintext.zeroize();

        let now_millis = self.clock.now_millis();
        let token = self.issue_token(now_millis / 1_000).await?;

        let payload = CwcPayload {
            job_id: format!("enclave-{}-{now_millis}", request.template_id),
            office_code: request.recipient.office_code,
            recipient_name: request.recipient.name,
            subject: message.subject,
            message: message.message,
            sender_name: message.sender_name,
            sender_email: message.sender_email,
            sender_address: message.sender_address,
            sender_phone: message.sender_phone,
            timestamp_millis: now_millis,
        };
        let result = self.delivery.submit(&payload, now_millis).await?;
        self.metrics.record_forward();
        self.metrics.observe_duration(self.clock.now_millis().saturating_sub(started));

        let encoded_token = STANDARD.encode(&token.raw);
        let confirmation = result.confirmation_id.unwrap_or_default();
        Ok((
            ForwardResponse {
                success: true,
                cwc_confirmation: confirmation,
                attestation_document: encoded_token.clone(),
            },
            encoded_token,
        ))
    }

    /// Handle `GET /attestation`.
    pub async fn attestation_info(&self) -> Result<AttestationInfo, EnclaveError> {
        let now_secs = self.clock.now_millis() / 1_000;
        let token = self.issue_token(now_secs).await?;

        Ok(AttestationInfo {
            provider: token.provider.as_str().to_string(),
            claims: token.claims,
            attestation_document: STANDARD.encode(&token.raw),
            timestamp: now_secs,
        })
    }

    async fn issue_token(&self, now_secs: u64) -> Result<AttestationToken, EnclaveError> {
        let public_key = self.keypair.public_key_sec1();
        Ok(self.issuer.issue(&public_key, now_secs).await?)
    }
}

/// Decode the request's base64 fields into an envelope.
fn decode_envelope(request: &DecryptRequest) -> Result<EncryptedEnvelope, EnclaveError> {
    let ciphertext = decode_field(&request.ciphertext, "ciphertext")?;
    let nonce_bytes = decode_field(&request.nonce, "nonce")?;
    let ephemeral_public_key = decode_field(&request.ephemeral_public_key, "ephemeralPublicKey")?;

    let nonce: [u8; NONCE_SIZE] = nonce_bytes.as_slice().try_into().map_err(|_| {
        EnclaveError::BadRequest {
            reason: format!("nonce must be {NONCE_SIZE} bytes, got {}", nonce_bytes.len()),
        }
    })?;

    if request.template_id.is_empty() {
        return Err(EnclaveError::BadRequest { reason: "templateId is empty".to_string() });
    }

    Ok(EncryptedEnvelope {
        ciphertext,
        nonce,
        ephemeral_public_key,
        template_id: request.template_id.clone(),
        recipient: request.recipient.office_code.clone(),
    })
}

fn decode_field(encoded: &str, field: &str) -> Result<Vec<u8>, EnclaveError> {
    STANDARD
        .decode(encoded)
        .map_err(|_| EnclaveError::BadRequest { reason: format!("{field} is not valid base64") })
}
