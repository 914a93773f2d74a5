//! Legislative API wire payload.
//!
//! The upstream submission API accepts a structured XML document. All
//! user-supplied text is escaped; the metadata block carries the job id
//! and submission timestamp so upstream support can correlate
//! deliveries without any message content.

use civica_core::SubmissionJob;

use crate::error::DeliveryError;

/// A validated, ready-to-serialize submission payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CwcPayload {
    /// Queue job id, carried in the metadata block
    pub job_id: String,
    /// Target office code
    pub office_code: String,
    /// Recipient display name
    pub recipient_name: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub message: String,
    /// Sender full name
    pub sender_name: String,
    /// Sender email
    pub sender_email: String,
    /// Sender postal address
    pub sender_address: String,
    /// Sender phone, if provided
    pub sender_phone: Option<String>,
    /// Submission timestamp (unix millis)
    pub timestamp_millis: u64,
}

impl CwcPayload {
    /// Build a payload from a queue job.
    pub fn from_job(job: &SubmissionJob, timestamp_millis: u64) -> Self {
        Self {
            job_id: job.job_id.clone(),
            office_code: job.office_identifier.clone(),
            recipient_name: job.recipient_name.clone(),
            subject: job.subject.clone(),
            message: job.message.clone(),
            sender_name: job.sender_name.clone(),
            sender_email: job.sender_email.clone(),
            sender_address: job.sender_address.clone(),
            sender_phone: job.sender_phone.clone(),
            timestamp_millis,
        }
    }

    /// Pre-flight structural validation.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Validation`] naming the first empty required
    /// element. Validation failures are non-retryable; the payload will
    /// not improve on a second attempt.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        let required = [
            ("JobId", &self.job_id),
            ("Office", &self.office_code),
            ("Recipient", &self.recipient_name),
            ("Subject", &self.subject),
            ("Body", &self.message),
            ("FullName", &self.sender_name),
            ("Email", &self.sender_email),
            ("Address", &self.sender_address),
        ];
        for (element, value) in required {
            if value.trim().is_empty() {
                return Err(DeliveryError::Validation {
                    reason: format!("required element {element} is empty"),
                });
            }
        }
        Ok(())
    }

    /// Serialize to the upstream XML document.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.message.len());
        xml.push_str("<CWC_Message>");

        xml.push_str("<Delivery>");
        push_element(&mut xml, "Office", &self.office_code);
        push_element(&mut xml, "Recipient", &self.recipient_name);
        xml.push_str("</Delivery>");

        xml.push_str("<Constituent>");
        push_element(&mut xml, "FullName", &self.sender_name);
        push_element(&mut xml, "Email", &self.sender_email);
        push_element(&mut xml, "Address", &self.sender_address);
        if let Some(phone) = &self.sender_phone {
            push_element(&mut xml, "Phone", phone);
        }
        xml.push_str("</Constituent>");

        xml.push_str("<Message>");
        push_element(&mut xml, "Subject", &self.subject);
        push_element(&mut xml, "Body", &self.message);
        xml.push_str("</Message>");

        xml.push_str("<Metadata>");
        push_element(&mut xml, "JobId", &self.job_id);
        push_element(&mut xml, "Timestamp", &self.timestamp_millis.to_string());
        xml.push_str("</Metadata>");

        xml.push_str("</CWC_Message>");
        xml
    }
}

fn push_element(xml: &mut String, name: &str, value: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push('>');
    xml.push_str(&xml_escape(value));
    xml.push_str("</");
    xml.push_str(name);
    xml.push('>');
}

/// Escape the five XML special characters.
pub fn xml_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Extract a confirmation id from an upstream response body.
///
/// Tries a JSON `confirmationId` field first, then a `<ConfirmationId>`
/// XML element. Returns `None` when neither is present; callers fall
/// back to [`fallback_confirmation_id`].
pub fn extract_confirmation_id(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(id) = value.get("confirmationId").and_then(serde_json::Value::as_str) {
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }

    let open = "<ConfirmationId>";
    let close = "</ConfirmationId>";
    let start = body.find(open)? + open.len();
    let end = body[start..].find(close)? + start;
    let id = body[start..end].trim();
    if id.is_empty() { None } else { Some(id.to_string()) }
}

/// Deterministic fallback id recorded when upstream confirms delivery
/// without returning an id of its own.
pub fn fallback_confirmation_id(job_id: &str, timestamp_millis: u64) -> String {
    format!("generated-{job_id}-{timestamp_millis}")
}
