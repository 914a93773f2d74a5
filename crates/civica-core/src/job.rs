//! Queued submission job model.
//!
//! Jobs are enqueued by the external submission API as JSON and consumed
//! by the workers. The wire schema is camelCase; every field other than
//! `senderPhone` and `metadata` is required, and a missing required
//! field is a non-retryable [`ValidationError`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Delivery priority requested by the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Default routing
    Normal,
    /// Expedited routing
    High,
}

/// A message submission job read from the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionJob {
    /// Unique job identifier assigned at enqueue time
    pub job_id: String,
    /// Legislative office this message targets
    pub office_identifier: String,
    /// Recipient display name
    pub recipient_name: String,
    /// Recipient contact address
    pub recipient_email: String,
    /// Message subject line
    pub subject: String,
    /// Message body (plaintext by the time it reaches the queue path)
    pub message: String,
    /// Sender full name
    pub sender_name: String,
    /// Sender email address
    pub sender_email: String,
    /// Sender postal address (required by the legislative API)
    pub sender_address: String,
    /// Sender phone number, if provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_phone: Option<String>,
    /// Delivery priority
    pub priority: Priority,
    /// Free-form metadata carried through to the wire payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Delivery attempts so far; mutated by the worker, absent on first
    /// enqueue
    #[serde(default)]
    pub retry_count: u32,
}

/// Required string fields of the queue schema, checked before
/// deserialization so the error names the exact field.
const REQUIRED_FIELDS: &[&str] = &[
    "jobId",
    "officeIdentifier",
    "recipientName",
    "recipientEmail",
    "subject",
    "message",
    "senderName",
    "senderEmail",
    "senderAddress",
    "priority",
];

impl SubmissionJob {
    /// Parse a job from its queue JSON representation.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingField`] if a required field is absent,
    /// null, or an empty string; [`ValidationError::Malformed`] if the
    /// payload is not valid JSON or a field has the wrong type. Both are
    /// non-retryable.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| ValidationError::Malformed { reason: err.to_string() })?;

        for field in REQUIRED_FIELDS {
            let present = match value.get(field) {
                None | Some(serde_json::Value::Null) => false,
                Some(serde_json::Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(ValidationError::MissingField { field });
            }
        }

        serde_json::from_value(value)
            .map_err(|err| ValidationError::Malformed { reason: err.to_string() })
    }
}

/// Job lifecycle phase reported to the status callback API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// Worker accepted the job and passed the rate-limit check
    Processing,
    /// Delivery confirmed by the legislative API
    Completed,
    /// Terminal failure; the job will not be retried by this worker
    Failed,
    /// Denied by the rate limiter; the queue will redeliver later
    RateLimited,
}

impl JobPhase {
    /// Wire name used by the status callback API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RateLimited => "rate_limited",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "jobId": "job-123",
            "officeIdentifier": "H-CA-12",
            "recipientName": "Rep. Example",
            "recipientEmail": "office@example.gov",
            "subject": "Infrastructure bill",
            "message": "Please support this measure.",
            "senderName": "Ada Citizen",
            "senderEmail": "ada@example.org",
            "senderAddress": "1 Main St, Springfield",
            "priority": "normal"
        })
    }

    #[test]
    fn parses_well_formed_job() {
        let job = SubmissionJob::from_json(&sample_json().to_string()).unwrap();
        assert_eq!(job.job_id, "job-123");
        assert_eq!(job.office_identifier, "H-CA-12");
        assert_eq!(job.priority, Priority::Normal);
        assert_eq!(job.retry_count, 0);
        assert!(job.sender_phone.is_none());
    }

    #[test]
    fn optional_fields_are_carried_through() {
        let mut json = sample_json();
        json["senderPhone"] = serde_json::json!("+1-555-0100");
        json["metadata"] = serde_json::json!({"campaign": "cvx-9"});
        json["priority"] = serde_json::json!("high");

        let job = SubmissionJob::from_json(&json.to_string()).unwrap();
        assert_eq!(job.sender_phone.as_deref(), Some("+1-555-0100"));
        assert_eq!(job.priority, Priority::High);
        assert!(job.metadata.is_some());
    }

    #[test]
    fn missing_field_names_the_field() {
        let mut json = sample_json();
        json.as_object_mut().unwrap().remove("recipientEmail");

        let err = SubmissionJob::from_json(&json.to_string()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "recipientEmail" });
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let mut json = sample_json();
        json["message"] = serde_json::json!("");

        let err = SubmissionJob::from_json(&json.to_string()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "message" });
    }

    #[test]
    fn null_counts_as_missing() {
        let mut json = sample_json();
        json["subject"] = serde_json::Value::Null;

        let err = SubmissionJob::from_json(&json.to_string()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "subject" });
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = SubmissionJob::from_json("{not json").unwrap_err();
        assert!(matches!(err, ValidationError::Malformed { .. }));
    }

    #[test]
    fn unknown_priority_is_malformed() {
        let mut json = sample_json();
        json["priority"] = serde_json::json!("urgent");

        let err = SubmissionJob::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed { .. }));
    }

    #[test]
    fn phase_wire_names() {
        assert_eq!(JobPhase::Processing.as_str(), "processing");
        assert_eq!(JobPhase::Completed.as_str(), "completed");
        assert_eq!(JobPhase::Failed.as_str(), "failed");
        assert_eq!(JobPhase::RateLimited.as_str(), "rate_limited");
    }
}
