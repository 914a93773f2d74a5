//! Per-job state machine and batch processing.
//!
//! Each job moves through: received, rate-limit check, processing,
//! submitting, then one of completed / failed / rate-limited. Denied and
//! failed jobs are released back to the queue instead of deleted, so
//! redelivery retries only the affected items; a completed job is
//! acknowledged immediately (partial-batch semantics).

use base64::{Engine as _, engine::general_purpose::STANDARD};
use civica_attest::{AttestationError, AttestationIssuer};
use civica_core::{
    BreakerError, Chamber, CircuitBreaker, Clock, FixedWindowLimiter, JobPhase, RateLimitStore,
    SubmissionJob,
};
use civica_delivery::{
    DeliveryClient, DeliveryError, DeliveryResult, RetryingProxyClient, wire::CwcPayload,
};
use thiserror::Error;

use crate::{
    queue::{QueueMessage, WorkQueue},
    status::StatusReporter,
};

/// Submission failure, from either delivery or attestation issuance.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The delivery call failed
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// No attestation token could be issued for the proxy path
    #[error("attestation unavailable: {0}")]
    Attestation(#[from] AttestationError),
}

/// How this worker reaches the legislative API.
pub enum Submitter {
    /// Direct HTTP to the chamber endpoint (House)
    Direct(DeliveryClient),
    /// Via the attestation-verifying proxy (Senate)
    Proxied {
        /// Retrying client posting to the proxy
        client: RetryingProxyClient,
        /// Issues the attestation token presented to the proxy
        issuer: AttestationIssuer,
        /// Real upstream endpoint, passed as `X-Target-Endpoint`
        target_endpoint: String,
    },
}

impl Submitter {
    async fn submit(
        &self,
        payload: &CwcPayload,
        now_millis: u64,
    ) -> Result<DeliveryResult, SubmitError> {
        match self {
            Self::Direct(client) => Ok(client.submit(payload, now_millis).await?),
            Self::Proxied { client, issuer, target_endpoint } => {
                let token = issuer.issue(&[], now_millis / 1_000).await?;
                let header = STANDARD.encode(&token.raw);
                Ok(client.submit(payload, &header, target_endpoint, now_millis).await?)
            },
        }
    }
}

/// A job confirmed by upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    /// Queue job id
    pub job_id: String,
    /// Confirmation id recorded for the submitter
    pub confirmation_id: String,
}

/// One item that must be redelivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMarker {
    /// Receipt of the failed delivery
    pub receipt: String,
    /// Job id, when the body parsed far enough to have one
    pub job_id: Option<String>,
    /// Failure description
    pub reason: String,
    /// True when the circuit breaker rejected the call without invoking
    /// the legislative API; not an upstream rejection
    pub circuit_open: bool,
}

/// Outcome of one batch, item by item.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Jobs confirmed and acknowledged
    pub completed: Vec<CompletedJob>,
    /// Jobs denied by the rate limiter and released for redelivery
    pub rate_limited: Vec<String>,
    /// Items released for redelivery with their failure markers
    pub failures: Vec<FailureMarker>,
}

/// A chamber-specific submission worker.
pub struct Worker<Q: WorkQueue, S: RateLimitStore, C: Clock> {
    chamber: Chamber,
    queue: Q,
    limiter: FixedWindowLimiter<S, C>,
    breaker: CircuitBreaker<C>,
    submitter: Submitter,
    status: StatusReporter,
    clock: C,
}

impl<Q: WorkQueue, S: RateLimitStore, C: Clock> Worker<Q, S, C> {
    /// Assemble a worker. The breaker and limiter are owned here and
    /// scoped to this warm process.
    pub fn new(
        chamber: Chamber,
        queue: Q,
        limiter: FixedWindowLimiter<S, C>,
        breaker: CircuitBreaker<C>,
        submitter: Submitter,
        status: StatusReporter,
        clock: C,
    ) -> Self {
        Self { chamber, queue, limiter, breaker, submitter, status, clock }
    }

    /// The queue this worker consumes.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// The breaker guarding this worker's submissions.
    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    /// Receive and process up to `max` jobs, one at a time.
    ///
    /// Individual failures never fail the batch: each item settles on
    /// its own as completed (deleted), rate limited (released), or
    /// failed (released with a marker).
    pub async fn process_batch(&self, max: usize) -> BatchReport {
        let messages = self.queue.receive(max);
        let mut report = BatchReport::default();

        for message in messages {
            self.process_message(message, &mut report).await;
        }
        report
    }

    async fn process_message(&self, message: QueueMessage, report: &mut BatchReport) {
        let job = match SubmissionJob::from_json(&message.body) {
            Ok(job) => job,
            Err(err) => {
                tracing::warn!(receipt = %message.receipt, error = %err, "malformed job body");
                self.queue.release(&message.receipt);
                report.failures.push(FailureMarker {
                    receipt: message.receipt,
                    job_id: None,
                    reason: err.to_string(),
                    circuit_open: false,
                });
                return;
            },
        };

        let identifier = self.chamber.rate_limit_identifier(&job).to_string();
        let decision = self.limiter.check(&identifier);
        if !decision.allowed {
            tracing::info!(
                job_id = %job.job_id,
                identifier = %identifier,
                retry_after_millis = decision.retry_after_millis,
                "rate limited, deferring to redelivery"
            );
            self.status.report(&job.job_id, JobPhase::RateLimited, None).await;
            self.queue.release(&message.receipt);
            report.rate_limited.push(job.job_id);
            return;
        }

        self.status.report(&job.job_id, JobPhase::Processing, None).await;

        let now_millis = self.clock.now_millis();
        let payload = CwcPayload::from_job(&job, now_millis);
        let outcome = self.breaker.execute(|| self.submitter.submit(&payload, now_millis)).await;

        match outcome {
            Ok(result) => {
                let confirmation_id = result.confirmation_id.unwrap_or_default();
                self.status.report(&job.job_id, JobPhase::Completed, Some(&confirmation_id)).await;
                self.queue.delete(&message.receipt);
                report.completed.push(CompletedJob { job_id: job.job_id, confirmation_id });
            },
            Err(BreakerError::Open(open)) => {
                // Fast-fail: the legislative API was never called, so
                // this is not reported as an upstream rejection.
                tracing::warn!(
                    job_id = %job.job_id,
                    retry_at_millis = open.retry_at_millis,
                    "circuit open, deferring job"
                );
                self.queue.release(&message.receipt);
                report.failures.push(FailureMarker {
                    receipt: message.receipt,
                    job_id: Some(job.job_id),
                    reason: "circuit breaker open".to_string(),
                    circuit_open: true,
                });
            },
            Err(BreakerError::Inner(err)) => {
                tracing::warn!(job_id = %job.job_id, error = %err, "submission failed");
                self.status.report(&job.job_id, JobPhase::Failed, Some(&err.to_string())).await;
                self.queue.release(&message.receipt);
                report.failures.push(FailureMarker {
                    receipt: message.receipt,
                    job_id: Some(job.job_id),
                    reason: err.to_string(),
                    circuit_open: false,
                });
            },
        }
    }
}
