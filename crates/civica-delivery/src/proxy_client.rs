//! Retrying client for the attestation-verifying proxy.
//!
//! Senate traffic must originate from the IP-allow-listed proxy, so the
//! worker submits through it instead of calling the legislative API
//! directly. The retry loop wraps each call with bounded exponential
//! backoff plus jitter; retryability is decided by the error taxonomy,
//! never re-derived here.

use std::time::Duration;

use rand::Rng as _;

use crate::{
    client::{DeliveryResult, classify_transport, finish_attempt},
    error::DeliveryError,
    wire::CwcPayload,
};

/// Retry policy for proxied submissions.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = max_retries + 1
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor per attempt
    pub backoff_multiplier: f64,
    /// Per-attempt request timeout
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Backoff delay before retrying after failed attempt `attempt`
    /// (1-based), before jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent as i32);
        Duration::from_secs_f64(scaled)
    }
}

/// Up to 10% random jitter, spreading retries from workers that failed
/// at the same moment.
fn jittered(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..1.1);
    delay.mul_f64(factor)
}

/// HTTP client that submits via the proxy with bounded retries.
#[derive(Debug, Clone)]
pub struct RetryingProxyClient {
    http: reqwest::Client,
    proxy_url: String,
    config: RetryConfig,
}

impl RetryingProxyClient {
    /// Create a client posting to `proxy_url` (the proxy's `/submit`
    /// endpoint).
    pub fn new(proxy_url: String, config: RetryConfig) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| DeliveryError::Network { reason: err.to_string() })?;
        Ok(Self { http, proxy_url, config })
    }

    /// Submit a payload through the proxy.
    ///
    /// The attestation token and the real upstream endpoint travel as
    /// headers; the proxy verifies the former and relays the XML body
    /// to the latter.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::RetriesExhausted`] once retryable failures spend
    /// the attempt budget; non-retryable failures surface immediately.
    pub async fn submit(
        &self,
        payload: &CwcPayload,
        attestation_token: &str,
        target_endpoint: &str,
        now_millis: u64,
    ) -> Result<DeliveryResult, DeliveryError> {
        payload.validate()?;
        let xml = payload.to_xml();
        let job_id = payload.job_id.clone();

        self.retry(|_attempt| {
            let xml = xml.clone();
            let job_id = job_id.clone();
            async move {
                let response = self
                    .http
                    .post(&self.proxy_url)
                    .header("Content-Type", "application/xml")
                    .header("X-Attestation-Token", attestation_token)
                    .header("X-Target-Endpoint", target_endpoint)
                    .body(xml)
                    .send()
                    .await
                    .map_err(|err| classify_transport(err, self.config.timeout))?;

                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .map_err(|err| DeliveryError::MalformedResponse { reason: err.to_string() })?;

                finish_attempt(status, body, &job_id, now_millis)
            }
        })
        .await
    }

    /// Run `operation` with this client's retry policy.
    ///
    /// The operation receives the 1-based attempt number. Retries happen
    /// only for errors whose [`DeliveryError::is_retryable`] is true.
    pub async fn retry<T, F, Fut>(&self, mut operation: F) -> Result<T, DeliveryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DeliveryError>>,
    {
        let started = tokio::time::Instant::now();
        let mut attempt: u32 = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt > self.config.max_retries => {
                    return Err(DeliveryError::RetriesExhausted {
                        attempts: attempt,
                        elapsed_millis: started.elapsed().as_millis() as u64,
                        last_error: err.to_string(),
                    });
                },
                Err(err) => {
                    let delay = jittered(self.config.delay_for_attempt(attempt));
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "proxy call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }
}
