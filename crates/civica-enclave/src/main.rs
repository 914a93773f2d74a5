//! Enclave decryption service binary.
//!
//! # Usage
//!
//! ```bash
//! # Local development (mock attestation)
//! civica-enclave --listen 127.0.0.1:8080 --cwc-endpoint http://localhost:9000/submit
//!
//! # Inside an enclave, platform detected automatically
//! civica-enclave --cwc-endpoint https://cwc.example.gov/v2/message
//! ```

use std::{sync::Arc, time::Duration};

use civica_attest::{AttestationIssuer, IssuerConfig, Provider};
use civica_core::SystemClock;
use civica_crypto::EnclaveKeyPair;
use civica_delivery::DeliveryClient;
use civica_enclave::{DecryptionService, EnclaveMetrics};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Civica enclave decryption service
#[derive(Parser, Debug)]
#[command(name = "civica-enclave")]
#[command(about = "Attested decryption and forwarding service")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Legislative API submission endpoint
    #[arg(long)]
    cwc_endpoint: String,

    /// Attestation provider override (gcp, azure, aws-nitro, mock);
    /// detected from the environment when omitted
    #[arg(long)]
    provider: Option<String>,

    /// Metadata endpoint base URL (cloud identity platforms)
    #[arg(long, default_value = "http://169.254.169.254")]
    metadata_url: String,

    /// Audience for requested identity tokens
    #[arg(long, default_value = "civica-delivery-pipeline")]
    audience: String,

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

    let provider = match &args.provider {
        Some(name) => Provider::from_name(name)
            .ok_or_else(|| format!("unknown attestation provider: {name}"))?,
        None => Provider::detect(),
    };
    tracing::info!(provider = provider.as_str(), "enclave service starting");

    let issuer = AttestationIssuer::new(
        provider,
        IssuerConfig {
            metadata_base_url: args.metadata_url,
            audience: args.audience,
            timeout: Duration::from_secs(args.timeout_secs),
        },
    )?;
    let delivery =
        DeliveryClient::new(args.cwc_endpoint, Duration::from_secs(args.timeout_secs))?;

    // One key pair per process lifetime; the private half never leaves.
    let keypair = EnclaveKeyPair::generate();
    tracing::info!(public_key_len = keypair.public_key_sec1().len(), "enclave key pair generated");

    let service = Arc::new(DecryptionService::new(
        keypair,
        issuer,
        delivery,
        Arc::new(EnclaveMetrics::new()),
        SystemClock,
    ));

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    tracing::info!(listen = %args.listen, "listening");

    civica_enclave::http::serve(listener, service).await?;
    Ok(())
}
