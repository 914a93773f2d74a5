//! Best-effort job-status callbacks.

use std::time::Duration;

use civica_core::JobPhase;

/// Reports phase transitions to the external status API.
///
/// Every failure here is logged and swallowed: a broken status API must
/// never fail a delivery that otherwise succeeded.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    client: Option<(reqwest::Client, String)>,
}

impl StatusReporter {
    /// Create a reporter posting to `base_url`, or a disabled reporter
    /// when no URL is configured.
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        let client = base_url.and_then(|base| {
            match reqwest::Client::builder().timeout(timeout).build() {
                Ok(http) => Some((http, base)),
                Err(err) => {
                    tracing::warn!(error = %err, "status reporting disabled: client build failed");
                    None
                },
            }
        });
        Self { client }
    }

    /// Reporter that drops every update.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Report one phase transition. Never fails.
    pub async fn report(&self, job_id: &str, phase: JobPhase, detail: Option<&str>) {
        let Some((http, base)) = &self.client else {
            tracing::debug!(job_id, phase = phase.as_str(), "status update (reporting disabled)");
            return;
        };

        let mut body = serde_json::json!({"status": phase.as_str()});
        if let Some(detail) = detail {
            body["detail"] = serde_json::json!(detail);
        }

        let url = format!("{base}/jobs/{job_id}/status");
        match http.put(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {},
            Ok(response) => {
                tracing::warn!(
                    job_id,
                    phase = phase.as_str(),
                    status = response.status().as_u16(),
                    "status callback rejected"
                );
            },
            Err(err) => {
                tracing::warn!(job_id, phase = phase.as_str(), error = %err, "status callback failed");
            },
        }
    }
}
