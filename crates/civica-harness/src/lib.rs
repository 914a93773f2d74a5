//! Test infrastructure shared across the pipeline crates.
//!
//! Dev-dependency only; nothing here ships in a production binary.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod stub;

pub use stub::StubServer;

/// A well-formed queue job document for tests.
pub fn sample_job(job_id: &str, office: &str) -> serde_json::Value {
    serde_json::json!({
        "jobId": job_id,
        "officeIdentifier": office,
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
