//! Civica submission workers.
//!
//! Consume the ordered work queue and move jobs to the legislative API:
//! rate-limit check first, then submission under the circuit breaker
//! (directly for the House, through the attestation-verifying proxy for
//! the Senate), with a best-effort status callback on every phase
//! transition.
//!
//! Batches settle item by item. A malformed or failed job is released
//! for redelivery with its own failure marker; it never forces
//! redelivery of jobs that already completed.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod queue;
pub mod status;
pub mod worker;

pub use queue::{InMemoryQueue, QueueMessage, WorkQueue};
pub use status::StatusReporter;
pub use worker::{BatchReport, CompletedJob, FailureMarker, SubmitError, Submitter, Worker};
