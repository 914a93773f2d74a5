//! Nitro Secure Module device session.

use aws_nitro_enclaves_nsm_api::api::{Request, Response};
use aws_nitro_enclaves_nsm_api::driver::{nsm_exit, nsm_init, nsm_process_request};
use serde_bytes::ByteBuf;

use crate::error::AttestationError;

/// An open NSM session.
///
/// Opened once when the issuer is constructed inside a Nitro enclave and
/// held for the process lifetime; each attestation request goes through
/// the same descriptor.
pub(crate) struct NsmDevice {
    fd: i32,
}

impl NsmDevice {
    /// Open the NSM driver. Fails outside a Nitro enclave.
    pub(crate) fn open() -> Result<Self, AttestationError> {
        let fd = nsm_init();
        if fd < 0 {
            return Err(AttestationError::Nsm { reason: "NSM device unavailable".to_string() });
        }
        tracing::info!("NSM session opened");
        Ok(Self { fd })
    }

    /// Request an attestation document embedding `public_key`.
    ///
    /// The document is returned as raw nested CBOR/COSE bytes; claims
    /// are decoded only by the verifier, never client-side.
    pub(crate) fn attestation_document(
        &self,
        public_key: &[u8],
    ) -> Result<Vec<u8>, AttestationError> {
        let request = Request::Attestation {
            user_data: None,
            nonce: None,
            public_key: Some(ByteBuf::from(public_key.to_vec())),
        };

        match nsm_process_request(self.fd, request) {
            Response::Attestation { document } => Ok(document),
            Response::Error(err) => {
                Err(AttestationError::Nsm { reason: format!("attestation request failed: {err:?}") })
            },
            other => Err(AttestationError::Nsm {
                reason: format!("unexpected NSM response: {other:?}"),
            }),
        }
    }
}

impl Drop for NsmDevice {
    fn drop(&mut self) {
        nsm_exit(self.fd);
    }
}
