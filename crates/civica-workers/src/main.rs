//! Submission worker binary.
//!
//! # Usage
//!
//! ```bash
//! # House worker, direct delivery
//! civica-worker --chamber house --jobs spool.jsonl \
//!   --cwc-endpoint https://cwc.house.gov/v2/message
//!
//! # Senate worker, routed through the verifying proxy
//! civica-worker --chamber senate --jobs spool.jsonl \
//!   --cwc-endpoint https://soapbox.senate.gov/api \
//!   --proxy-url http://proxy.internal:8443/submit
//! ```
//!
//! The spool file holds one job JSON document per line. The worker
//! drains it batch by batch and exits when the queue is empty.

use std::time::Duration;

use civica_attest::{AttestationIssuer, IssuerConfig, Provider};
use civica_core::{BreakerConfig, Chamber, CircuitBreaker, FixedWindowLimiter, MemoryRateLimitStore, SystemClock};
use civica_delivery::{DeliveryClient, RetryConfig, RetryingProxyClient};
use civica_workers::{InMemoryQueue, StatusReporter, Submitter, WorkQueue as _, Worker};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Civica submission worker
#[derive(Parser, Debug)]
#[command(name = "civica-worker")]
#[command(about = "Delivers queued submission jobs to a legislative chamber API")]
#[command(version)]
struct Args {
    /// Chamber this worker serves (house, senate)
    #[arg(long)]
    chamber: Chamber,

    /// Spool file with one job JSON document per line
    #[arg(long)]
    jobs: String,

    /// Legislative API submission endpoint
    #[arg(long)]
    cwc_endpoint: String,

    /// Proxy submit URL, required for the senate
    #[arg(long)]
    proxy_url: Option<String>,

    /// Status callback API base URL; reporting is disabled when omitted
    #[arg(long)]
    status_url: Option<String>,

    /// Jobs received per batch
    #[arg(long, default_value = "10")]
    batch_size: usize,

    /// Pause between batches in seconds
    #[arg(long, default_value = "5")]
    poll_interval_secs: u64,

    /// Consecutive failures that open the circuit
    #[arg(long, default_value = "5")]
    failure_threshold: u32,

    /// Circuit cooldown before a probe, in seconds
    #[arg(long, default_value = "30")]
    reset_timeout_secs: u64,

    /// Attestation provider override for the proxy path
    #[arg(long)]
    provider: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_spool(queue: &InMemoryQueue, path: &str) -> Result<usize, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    let mut loaded = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Group by target office so per-office ordering holds.
        let group = serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|v| v.get("officeIdentifier").and_then(|o| o.as_str().map(str::to_string)))
            .unwrap_or_else(|| "unrouted".to_string());
        queue.push(&group, line.to_string());
        loaded += 1;
    }
    Ok(loaded)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let timeout = Duration::from_secs(args.timeout_secs);

    let submitter = if args.chamber.routes_via_proxy() {
        let proxy_url = args
            .proxy_url
            .clone()
            .ok_or("senate worker requires --proxy-url")?;
        let provider = match &args.provider {
            Some(name) => Provider::from_name(name)
                .ok_or_else(|| format!("unknown attestation provider: {name}"))?,
            None => Provider::detect(),
        };
        Submitter::Proxied {
            client: RetryingProxyClient::new(
                proxy_url,
                RetryConfig { timeout, ..RetryConfig::default() },
            )?,
            issuer: AttestationIssuer::new(provider, IssuerConfig::default())?,
            target_endpoint: args.cwc_endpoint.clone(),
        }
    } else {
        Submitter::Direct(DeliveryClient::new(args.cwc_endpoint.clone(), timeout)?)
    };

    let queue = InMemoryQueue::new();
    let loaded = load_spool(&queue, &args.jobs)?;
    tracing::info!(chamber = args.chamber.as_str(), loaded, "spool loaded");

    let clock = SystemClock::new();
    let limiter = FixedWindowLimiter::new(
        args.chamber.rate_limit_action(),
        args.chamber.default_rate_limit(),
        MemoryRateLimitStore::new(),
        clock.clone(),
    );
    let breaker = CircuitBreaker::new(
        format!("cwc-{}", args.chamber.as_str()),
        BreakerConfig {
            failure_threshold: args.failure_threshold,
            reset_timeout: Duration::from_secs(args.reset_timeout_secs),
        },
        clock.clone(),
    );
    let status = StatusReporter::new(args.status_url.clone(), timeout);

    let worker = Worker::new(args.chamber, queue, limiter, breaker, submitter, status, clock);

    loop {
        let report = worker.process_batch(args.batch_size).await;
        tracing::info!(
            completed = report.completed.len(),
            rate_limited = report.rate_limited.len(),
            failed = report.failures.len(),
            depth = worker.queue().depth(),
            "batch settled"
        );

        if worker.queue().depth() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(args.poll_interval_secs)).await;
    }

    tracing::info!("spool drained, exiting");
    Ok(())
}
