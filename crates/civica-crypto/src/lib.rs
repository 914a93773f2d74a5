//! Civica Envelope Cryptography
//!
//! Cryptographic building blocks for the confidential message pipeline.
//! A sender seals a message against the enclave's published public key;
//! only code holding the enclave private key can open it.
//!
//! # Key Lifecycle
//!
//! ```text
//! Enclave P-256 key pair (one per process lifetime)
//!        │
//!        ▼
//! ECDH(enclave private, sender ephemeral public) → shared secret
//!        │
//!        ▼
//! HKDF-SHA256 (empty salt, empty info) → 256-bit AEAD key
//!        │
//!        ▼
//! AES-256-GCM → plaintext
//! ```
//!
//! Every derived key is scoped to a single `open` or `seal` call and
//! zeroized before the call returns. Nothing derived from the shared
//! secret is cached across requests.
//!
//! # Security
//!
//! Confidentiality:
//! - Each message uses a fresh sender-side ephemeral key
//! - The enclave private key never leaves the process; only the SEC1
//!   public encoding is exported (for embedding in attestation)
//!
//! Authenticity:
//! - AES-256-GCM with a 128-bit tag; any tampering fails authentication
//! - A failed tag check yields [`DecryptionError`], never partial plaintext

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
mod error;
mod keypair;

pub use envelope::{EncryptedEnvelope, NONCE_SIZE, TAG_SIZE, seal};
pub use error::DecryptionError;
pub use keypair::EnclaveKeyPair;
