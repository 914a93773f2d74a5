//! Attestation-verifying proxy binary.
//!
//! # Usage
//!
//! ```bash
//! civica-proxy \
//!   --listen 0.0.0.0:8443 \
//!   --allow-host soapbox.senate.gov \
//!   --allow-measurement sha256:3f1a... \
//!   --allow-measurement sha256:9c0b...
//! ```

use std::{sync::Arc, time::Duration};

use civica_attest::VerifierPolicy;
use civica_proxy::ProxyService;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Civica attestation-verifying proxy
#[derive(Parser, Debug)]
#[command(name = "civica-proxy")]
#[command(about = "Verifies enclave attestation and relays submissions to allow-listed hosts")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8443")]
    listen: String,

    /// Target host the proxy may relay to (repeatable)
    #[arg(long = "allow-host", required = true)]
    allow_hosts: Vec<String>,

    /// Trusted code measurement (repeatable)
    #[arg(long = "allow-measurement")]
    allow_measurements: Vec<String>,

    /// Accept labeled mock attestation tokens. Development only.
    #[arg(long)]
    allow_mock: bool,

    /// Upstream request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if args.allow_measurements.is_empty() && !args.allow_mock {
        tracing::warn!("no trusted measurements configured; every real token will be refused");
    }

    let service = Arc::new(ProxyService::new(
        VerifierPolicy {
            allowed_measurements: args.allow_measurements,
            allow_mock: args.allow_mock,
        },
        args.allow_hosts,
        Duration::from_secs(args.timeout_secs),
    )?);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    tracing::info!(listen = %args.listen, "proxy listening");

    civica_proxy::http::serve(listener, service).await?;
    Ok(())
}
