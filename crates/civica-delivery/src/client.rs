//! Direct HTTP client for the legislative submission API.

use std::time::Duration;

use crate::{
    error::DeliveryError,
    wire::{CwcPayload, extract_confirmation_id, fallback_confirmation_id},
};

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// Whether upstream accepted the submission
    pub success: bool,
    /// Confirmation id, extracted from the response or generated
    pub confirmation_id: Option<String>,
    /// Raw upstream response body
    pub raw_response: String,
    /// Attempt timestamp (unix millis)
    pub timestamp_ms: u64,
    /// Diagnostic for failed attempts
    pub error_detail: Option<String>,
}

/// Direct client for the House submission path.
///
/// Submits the XML payload straight to the configured endpoint. Senate
/// traffic goes through [`crate::RetryingProxyClient`] instead, which
/// shares the same status classification.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl DeliveryClient {
    /// Create a client for `endpoint` with a per-request `timeout`.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DeliveryError::Network { reason: err.to_string() })?;
        Ok(Self { http, endpoint, timeout })
    }

    /// Submit a payload.
    ///
    /// Validates before sending; a validation failure never reaches the
    /// wire. On 2xx the confirmation id is extracted from the body, or
    /// generated when upstream returns none.
    ///
    /// # Errors
    ///
    /// See [`DeliveryError`]; retryability is encoded per variant.
    pub async fn submit(
        &self,
        payload: &CwcPayload,
        now_millis: u64,
    ) -> Result<DeliveryResult, DeliveryError> {
        payload.validate()?;
        let xml = payload.to_xml();

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/xml")
            .body(xml)
            .send()
            .await
            .map_err(|err| classify_transport(err, self.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| DeliveryError::MalformedResponse { reason: err.to_string() })?;

        finish_attempt(status, body, &payload.job_id, now_millis)
    }
}

/// Map a transport error to the delivery taxonomy.
pub(crate) fn classify_transport(err: reqwest::Error, timeout: Duration) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout { after: timeout }
    } else {
        DeliveryError::Network { reason: err.to_string() }
    }
}

/// Classify a non-success upstream status.
///
/// 429 and 408 are transient throttling/timeout signals and retryable;
/// other 4xx statuses are rejections that will not improve on retry;
/// 5xx is retryable.
pub(crate) fn classify_status(status: u16, body: String) -> DeliveryError {
    let retryable = match status {
        429 | 408 => true,
        400..=499 => false,
        _ => true,
    };
    DeliveryError::UpstreamStatus { status, retryable, body }
}

/// Turn an upstream status and body into the attempt outcome shared by
/// the direct and proxied paths.
pub(crate) fn finish_attempt(
    status: u16,
    body: String,
    job_id: &str,
    now_millis: u64,
) -> Result<DeliveryResult, DeliveryError> {
    if !(200..300).contains(&status) {
        return Err(classify_status(status, body));
    }

    let confirmation_id = extract_confirmation_id(&body)
        .unwrap_or_else(|| fallback_confirmation_id(job_id, now_millis));
    tracing::info!(job_id, %confirmation_id, status, "delivery confirmed");

    Ok(DeliveryResult {
        success: true,
        confirmation_id: Some(confirmation_id),
        raw_response: body,
        timestamp_ms: now_millis,
        error_detail: None,
    })
}
