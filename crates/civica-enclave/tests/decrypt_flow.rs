//! End-to-end decrypt-and-forward flow against a stub upstream.

use std::{sync::Arc, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use civica_attest::{AttestationIssuer, IssuerConfig, Provider, parse_mock_token};
use civica_core::ManualClock;
use civica_crypto::{EnclaveKeyPair, seal};
use civica_delivery::DeliveryClient;
use civica_enclave::{DecryptionService, EnclaveError, EnclaveMetrics};
use civica_harness::StubServer;

/// Build a service against `upstream`, returning its published public
/// key so tests can seal envelopes it can open.
fn build_service(upstream: String) -> (DecryptionService<ManualClock>, Vec<u8>) {
    let keypair = EnclaveKeyPair::generate();
    let public_key = keypair.public_key_sec1();

    let issuer = AttestationIssuer::new(Provider::Mock, IssuerConfig::default()).unwrap();
    let delivery = DeliveryClient::new(upstream, Duration::from_secs(5)).unwrap();

    let service = DecryptionService::new(
        keypair,
        issuer,
        delivery,
        Arc::new(EnclaveMetrics::new()),
        ManualClock::starting_at(1_700_000_000_000),
    );
    (service, public_key)
}

fn request_body(public_key: &[u8]) -> Vec<u8> {
    let plaintext = serde_json::json!({
        "subject": "Support the bill",
        "message": "Please vote yes.",
        "senderName": "Ada Citizen",
        "senderEmail": "ada@example.org",
        "senderAddress": "1 Main St, Springfield",
    });
    let envelope =
        seal(plaintext.to_string().as_bytes(), public_key, "tpl-1", "H-CA-12").unwrap();

    serde_json::to_vec(&serde_json::json!({
        "ciphertext": STANDARD.encode(&envelope.ciphertext),
        "nonce": STANDARD.encode(envelope.nonce),
        "ephemeralPublicKey": STANDARD.encode(&envelope.ephemeral_public_key),
        "templateId": "tpl-1",
        "recipient": {"officeCode": "H-CA-12", "name": "Rep. Example"}
    }))
    .unwrap()
}

#[tokio::test]
async fn decrypts_and_forwards_a_sealed_message() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "abc"}"#).await.unwrap();
    let (service, public_key) = build_service(upstream.url.clone());

    let (response, token) =
        service.decrypt_and_forward(&request_body(&public_key)).await.unwrap();

    assert!(response.success);
    assert_eq!(response.cwc_confirmation, "abc");
    assert_eq!(response.attestation_document, token);
    assert_eq!(upstream.hits(), 1);

    // The forwarded body is the XML payload carrying the message.
    let forwarded = String::from_utf8(upstream.last_body()).unwrap();
    assert!(forwarded.contains("<Body>Please vote yes.</Body>"));
    assert!(forwarded.contains("<Office>H-CA-12</Office>"));

    // Header token decodes to a labeled mock token bound to the key.
    let raw = STANDARD.decode(&token).unwrap();
    let claims = parse_mock_token(&raw).expect("mock token");
    assert_eq!(claims.public_key.as_deref(), Some(public_key.as_slice()));

    let rendered = service.metrics().render();
    assert!(rendered.contains("civica_decryptions_total 1"));
    assert!(rendered.contains("civica_forwards_total 1"));
    assert!(rendered.contains("civica_decryption_errors_total 0"));
}

#[tokio::test]
async fn tampered_envelope_is_rejected_without_forwarding() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "abc"}"#).await.unwrap();
    let (service, public_key) = build_service(upstream.url.clone());

    let mut body: serde_json::Value = serde_json::from_slice(&request_body(&public_key)).unwrap();
    let mut ciphertext = STANDARD.decode(body["ciphertext"].as_str().unwrap()).unwrap();
    ciphertext[0] ^= 0xFF;
    body["ciphertext"] = serde_json::json!(STANDARD.encode(&ciphertext));

    let err =
        service.decrypt_and_forward(&serde_json::to_vec(&body).unwrap()).await.unwrap_err();
    assert!(matches!(err, EnclaveError::Decryption(_)));
    assert_eq!(err.http_status(), 400);
    assert_eq!(upstream.hits(), 0, "nothing may reach upstream after a failed decrypt");

    let rendered = service.metrics().render();
    assert!(rendered.contains("civica_decryption_errors_total 1"));
    assert!(rendered.contains("civica_forwards_total 0"));
}

#[tokio::test]
async fn garbled_plaintext_error_does_not_quote_content() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "abc"}"#).await.unwrap();
    let (service, public_key) = build_service(upstream.url.clone());

    // Seal something that is not a message JSON document.
    let envelope = seal(b"not json at all", &public_key, "tpl-1", "H-CA-12").unwrap();
    let body = serde_json::to_vec(&serde_json::json!({
        "ciphertext": STANDARD.encode(&envelope.ciphertext),
        "nonce": STANDARD.encode(envelope.nonce),
        "ephemeralPublicKey": STANDARD.encode(&envelope.ephemeral_public_key),
        "templateId": "tpl-1",
        "recipient": {"officeCode": "H-CA-12", "name": "Rep. Example"}
    }))
    .unwrap();

    let err = service.decrypt_and_forward(&body).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert!(!err.to_string().contains("not json at all"), "error must not echo plaintext");
    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn upstream_rejection_maps_to_bad_gateway() {
    let upstream = StubServer::start(400, r#"{"error": "bad payload"}"#).await.unwrap();
    let (service, public_key) = build_service(upstream.url.clone());

    let err = service.decrypt_and_forward(&request_body(&public_key)).await.unwrap_err();
    assert!(matches!(err, EnclaveError::Forward(_)));
    assert_eq!(err.http_status(), 502);
}

#[tokio::test]
async fn attestation_endpoint_reports_provider_and_document() {
    let upstream = StubServer::start(200, "{}").await.unwrap();
    let (service, _) = build_service(upstream.url.clone());

    let info = service.attestation_info().await.unwrap();
    assert_eq!(info.provider, "mock");
    assert_eq!(info.timestamp, 1_700_000_000);
    assert!(parse_mock_token(&STANDARD.decode(&info.attestation_document).unwrap()).is_some());
}
