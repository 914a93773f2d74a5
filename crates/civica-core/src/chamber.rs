//! Legislative chamber variants and their delivery policies.

use std::time::Duration;

use crate::{job::SubmissionJob, limiter::RateLimitConfig};

/// The two chambers a worker variant can serve.
///
/// The chambers differ in two operational ways: the House API is called
/// directly while the Senate API requires routing through the
/// IP-allow-listed proxy, and their rate-limit ceilings are materially
/// different (a small per-minute budget per office vs. a larger
/// per-hour budget per user).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chamber {
    /// House of Representatives
    House,
    /// Senate
    Senate,
}

impl Chamber {
    /// Default rate-limit policy for this chamber.
    ///
    /// Deployments override these via worker configuration; the defaults
    /// exist so local runs behave sanely, not to be authoritative.
    pub fn default_rate_limit(self) -> RateLimitConfig {
        match self {
            Self::House => RateLimitConfig {
                window: Duration::from_secs(60),
                max_requests: 5,
                grace: Duration::from_secs(60),
            },
            Self::Senate => RateLimitConfig {
                window: Duration::from_secs(3_600),
                max_requests: 20,
                grace: Duration::from_secs(300),
            },
        }
    }

    /// Action namespace for the rate-limit store.
    pub fn rate_limit_action(self) -> &'static str {
        match self {
            Self::House => "house-office",
            Self::Senate => "senate-user",
        }
    }

    /// The identifier a job is rate-limited by: the target office for
    /// the House, the sending user for the Senate.
    pub fn rate_limit_identifier(self, job: &SubmissionJob) -> &str {
        match self {
            Self::House => &job.office_identifier,
            Self::Senate => &job.sender_email,
        }
    }

    /// Whether submissions must route through the attestation-verifying
    /// proxy (IP-allow-listed path).
    pub fn routes_via_proxy(self) -> bool {
        matches!(self, Self::Senate)
    }

    /// Lowercase wire/CLI name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Senate => "senate",
        }
    }
}

impl std::str::FromStr for Chamber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "house" => Ok(Self::House),
            "senate" => Ok(Self::Senate),
            other => Err(format!("unknown chamber: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> SubmissionJob {
        SubmissionJob::from_json(
            &serde_json::json!({
                "jobId": "j1",
                "officeIdentifier": "S-VT",
                "recipientName": "Sen. Example",
                "recipientEmail": "office@example.gov",
                "subject": "s",
                "message": "m",
                "senderName": "Ada",
                "senderEmail": "ada@example.org",
                "senderAddress": "1 Main St",
                "priority": "normal"
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn ceilings_differ_between_chambers() {
        let house = Chamber::House.default_rate_limit();
        let senate = Chamber::Senate.default_rate_limit();
        assert_ne!(house.window, senate.window);
        assert_ne!(house.max_requests, senate.max_requests);
    }

    #[test]
    fn house_limits_by_office_senate_by_user() {
        let job = job();
        assert_eq!(Chamber::House.rate_limit_identifier(&job), "S-VT");
        assert_eq!(Chamber::Senate.rate_limit_identifier(&job), "ada@example.org");
    }

    #[test]
    fn only_senate_routes_via_proxy() {
        assert!(!Chamber::House.routes_via_proxy());
        assert!(Chamber::Senate.routes_via_proxy());
    }

    #[test]
    fn parses_from_cli_names() {
        assert_eq!("house".parse::<Chamber>().unwrap(), Chamber::House);
        assert_eq!("SENATE".parse::<Chamber>().unwrap(), Chamber::Senate);
        assert!("parliament".parse::<Chamber>().is_err());
    }
}
