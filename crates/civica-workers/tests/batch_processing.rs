//! Worker state machine and partial-batch semantics against a stub
//! upstream.

use std::time::Duration;

use civica_attest::{AttestationIssuer, IssuerConfig, Provider, VerifierPolicy};
use civica_core::{
    BreakerConfig, BreakerState, Chamber, CircuitBreaker, FixedWindowLimiter, ManualClock,
    MemoryRateLimitStore, RateLimitConfig,
};
use civica_delivery::{DeliveryClient, RetryConfig, RetryingProxyClient};
use civica_harness::{StubServer, sample_job};
use civica_workers::{InMemoryQueue, StatusReporter, Submitter, WorkQueue as _, Worker};

type TestWorker = Worker<InMemoryQueue, MemoryRateLimitStore, ManualClock>;

fn direct(upstream: &StubServer) -> Submitter {
    Submitter::Direct(DeliveryClient::new(upstream.url.clone(), Duration::from_secs(5)).unwrap())
}

fn build_worker(
    chamber: Chamber,
    submitter: Submitter,
    rate: RateLimitConfig,
    breaker_config: BreakerConfig,
    status: StatusReporter,
) -> TestWorker {
    let clock = ManualClock::starting_at(1_700_000_000_000);
    let limiter = FixedWindowLimiter::new(
        chamber.rate_limit_action(),
        rate,
        MemoryRateLimitStore::new(),
        clock.clone(),
    );
    let breaker =
        CircuitBreaker::new(format!("cwc-{}", chamber.as_str()), breaker_config, clock.clone());

    Worker::new(chamber, InMemoryQueue::new(), limiter, breaker, submitter, status, clock)
}

fn house_worker(upstream: &StubServer) -> TestWorker {
    build_worker(
        Chamber::House,
        direct(upstream),
        Chamber::House.default_rate_limit(),
        BreakerConfig::default(),
        StatusReporter::disabled(),
    )
}

#[tokio::test]
async fn well_formed_job_completes_with_upstream_confirmation() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "abc"}"#).await.unwrap();
    let worker = house_worker(&upstream);

    worker.queue().push("H-CA-12", sample_job("job-1", "H-CA-12").to_string());
    let report = worker.process_batch(10).await;

    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].job_id, "job-1");
    assert_eq!(report.completed[0].confirmation_id, "abc");
    assert!(report.failures.is_empty());
    assert!(report.rate_limited.is_empty());
    assert_eq!(worker.queue().depth(), 0, "completed job must be acknowledged");
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn malformed_job_is_the_only_failed_item() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "ok"}"#).await.unwrap();
    let worker = house_worker(&upstream);

    let mut broken = sample_job("job-2", "H-2");
    broken.as_object_mut().unwrap().remove("recipientEmail");

    worker.queue().push("H-1", sample_job("job-1", "H-1").to_string());
    worker.queue().push("H-2", broken.to_string());
    worker.queue().push("H-3", sample_job("job-3", "H-3").to_string());

    let report = worker.process_batch(10).await;

    let completed: Vec<&str> = report.completed.iter().map(|c| c.job_id.as_str()).collect();
    assert_eq!(completed, vec!["job-1", "job-3"]);

    assert_eq!(report.failures.len(), 1, "only the malformed item may fail");
    assert!(report.failures[0].reason.contains("recipientEmail"));
    assert!(!report.failures[0].circuit_open);

    // The failed item alone stays queued for redelivery.
    assert_eq!(worker.queue().depth(), 1);
    assert_eq!(upstream.hits(), 2);
}

#[tokio::test]
async fn over_quota_job_is_released_not_deleted() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "ok"}"#).await.unwrap();
    let worker = build_worker(
        Chamber::House,
        direct(&upstream),
        RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests: 1,
            grace: Duration::from_secs(60),
        },
        BreakerConfig::default(),
        StatusReporter::disabled(),
    );

    worker.queue().push("H-CA-12", sample_job("job-1", "H-CA-12").to_string());
    worker.queue().push("H-CA-12", sample_job("job-2", "H-CA-12").to_string());

    let first = worker.process_batch(10).await;
    assert_eq!(first.completed.len(), 1);

    let second = worker.process_batch(10).await;
    assert_eq!(second.rate_limited, vec!["job-2".to_string()]);
    assert!(second.completed.is_empty());
    assert_eq!(worker.queue().depth(), 1, "denied job must stay for redelivery");
    assert_eq!(upstream.hits(), 1, "denied job never reaches upstream");
}

#[tokio::test]
async fn open_circuit_defers_without_calling_upstream() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "ok"}"#).await.unwrap();
    let worker = house_worker(&upstream);
    worker.breaker().force_open();

    worker.queue().push("H-CA-12", sample_job("job-1", "H-CA-12").to_string());
    let report = worker.process_batch(10).await;

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].circuit_open, "must be distinguishable from an API rejection");
    assert_eq!(report.failures[0].job_id.as_deref(), Some("job-1"));
    assert_eq!(upstream.hits(), 0);
    assert_eq!(worker.queue().depth(), 1);
}

#[tokio::test]
async fn repeated_upstream_failures_open_the_circuit() {
    let upstream = StubServer::start(503, "down").await.unwrap();
    let worker = build_worker(
        Chamber::House,
        direct(&upstream),
        Chamber::House.default_rate_limit(),
        BreakerConfig { failure_threshold: 2, reset_timeout: Duration::from_secs(30) },
        StatusReporter::disabled(),
    );

    worker.queue().push("H-CA-12", sample_job("job-1", "H-CA-12").to_string());

    let first = worker.process_batch(10).await;
    assert!(!first.failures[0].circuit_open);

    let second = worker.process_batch(10).await;
    assert!(!second.failures[0].circuit_open);
    assert_eq!(worker.breaker().snapshot().state, BreakerState::Open);

    let third = worker.process_batch(10).await;
    assert!(third.failures[0].circuit_open, "third attempt must fast-fail");
    assert_eq!(upstream.hits(), 2, "open circuit must not call upstream");
}

#[tokio::test]
async fn status_callback_failure_does_not_fail_the_job() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "abc"}"#).await.unwrap();
    let status_api = StubServer::start(500, "broken").await.unwrap();

    let worker = build_worker(
        Chamber::House,
        direct(&upstream),
        Chamber::House.default_rate_limit(),
        BreakerConfig::default(),
        StatusReporter::new(Some(status_api.url.clone()), Duration::from_secs(5)),
    );

    worker.queue().push("H-CA-12", sample_job("job-1", "H-CA-12").to_string());
    let report = worker.process_batch(10).await;

    assert_eq!(report.completed.len(), 1);
    assert!(status_api.hits() >= 1, "status updates were attempted");
}

#[tokio::test]
async fn senate_worker_submits_through_the_verifying_proxy() {
    let upstream = StubServer::start(200, r#"{"confirmationId": "senate-77"}"#).await.unwrap();

    let proxy_service = std::sync::Arc::new(
        civica_proxy::ProxyService::new(
            VerifierPolicy { allowed_measurements: vec![], allow_mock: true },
            vec![upstream.host.clone()],
            Duration::from_secs(5),
        )
        .unwrap(),
    );
    let proxy_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = proxy_listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = civica_proxy::http::serve(proxy_listener, proxy_service).await;
    });

    let submitter = Submitter::Proxied {
        client: RetryingProxyClient::new(
            format!("http://{proxy_addr}/submit"),
            RetryConfig::default(),
        )
        .unwrap(),
        issuer: AttestationIssuer::new(Provider::Mock, IssuerConfig::default()).unwrap(),
        target_endpoint: upstream.endpoint("/api"),
    };
    let worker = build_worker(
        Chamber::Senate,
        submitter,
        Chamber::Senate.default_rate_limit(),
        BreakerConfig::default(),
        StatusReporter::disabled(),
    );

    worker.queue().push("S-VT", sample_job("job-1", "S-VT").to_string());
    let report = worker.process_batch(10).await;

    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].confirmation_id, "senate-77");
    assert_eq!(upstream.hits(), 1);

    let relayed = String::from_utf8(upstream.last_body()).unwrap();
    assert!(relayed.contains("<Office>S-VT</Office>"), "XML must reach upstream verbatim");
}
