//! HTTP surface of the decryption service.
//!
//! Routes:
//!
//! - `POST /decrypt-and-forward`: decrypt an envelope and forward it
//! - `GET /attestation`: fresh attestation document and claims
//! - `GET /health`: liveness plus the queue-depth gauge
//! - `GET /metrics`: Prometheus text exposition
//!
//! Request bodies are never logged; error responses carry only the
//! error display string, which by construction holds no plaintext.

use std::sync::Arc;

use bytes::Bytes;
use civica_core::Clock;
use http_body_util::{BodyExt as _, Full};
use hyper::{
    Method, Request, Response, StatusCode,
    body::Incoming,
    header::{self, HeaderValue},
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::service::DecryptionService;

/// Serve requests on `listener` until the process exits.
///
/// # Errors
///
/// Returns the accept-loop I/O error; per-connection errors are logged
/// and do not stop the server.
pub async fn serve<C: Clock>(
    listener: TcpListener,
    service: Arc<DecryptionService<C>>,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let service = Arc::clone(&service);

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let handler = service_fn(move |req| {
                let service = Arc::clone(&service);
                async move { Ok::<_, std::convert::Infallible>(route(req, &service).await) }
            });

            if let Err(err) =
                hyper::server::conn::http1::Builder::new().serve_connection(io, handler).await
            {
                tracing::debug!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}

/// Dispatch one request.
pub async fn route<C: Clock>(
    req: Request<Incoming>,
    service: &DecryptionService<C>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::POST, "/decrypt-and-forward") => decrypt_and_forward(req, service).await,
        (Method::GET, "/attestation") => attestation(service).await,
        (Method::GET, "/health") => health(service),
        (Method::GET, "/metrics") => metrics(service),
        _ => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"success": false, "error": "not found"}),
        ),
    }
}

async fn decrypt_and_forward<C: Clock>(
    req: Request<Incoming>,
    service: &DecryptionService<C>,
) -> Response<Full<Bytes>> {
    let _in_flight = service.metrics().track_request();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &serde_json::json!({"success": false, "error": format!("body read failed: {err}")}),
            );
        },
    };

    match service.decrypt_and_forward(&body).await {
        Ok((response, token)) => {
            let body = serde_json::to_value(&response).unwrap_or_default();
            let mut http = json_response(StatusCode::OK, &body);
            if let Ok(value) = HeaderValue::from_str(&token) {
                http.headers_mut().insert("X-Attestation-Token", value);
            }
            http
        },
        Err(err) => error_response(&err),
    }
}

async fn attestation<C: Clock>(service: &DecryptionService<C>) -> Response<Full<Bytes>> {
    match service.attestation_info().await {
        Ok(info) => {
            json_response(StatusCode::OK, &serde_json::to_value(&info).unwrap_or_default())
        },
        Err(err) => error_response(&err),
    }
}

fn health<C: Clock>(service: &DecryptionService<C>) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "ok",
            "queueDepth": service.metrics().queue_depth(),
        }),
    )
}

fn metrics<C: Clock>(service: &DecryptionService<C>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(service.metrics().render())));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

fn error_response(err: &crate::error::EnclaveError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &serde_json::json!({"success": false, "error": err.to_string()}))
}

/// Build a JSON response without panicking paths.
fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
