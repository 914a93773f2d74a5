//! HTTP surface of the relay.
//!
//! - `POST /submit`: verify `X-Attestation-Token`, check
//!   `X-Target-Endpoint` against the allow-list, relay the body verbatim
//! - `GET /health`: liveness
//!
//! Error responses never include the request body.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::{
    Method, Request, Response, StatusCode,
    body::Incoming,
    header::{self, HeaderValue},
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::{error::ProxyError, service::ProxyService};

/// Serve relay requests on `listener` until the process exits.
///
/// # Errors
///
/// Returns the accept-loop I/O error; per-connection errors are logged
/// and do not stop the server.
pub async fn serve(listener: TcpListener, service: Arc<ProxyService>) -> std::io::Result<()> {
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
pub async fn route(req: Request<Incoming>, service: &ProxyService) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::POST, "/submit") => submit(req, service).await,
        (Method::GET, "/health") => {
            json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}))
        },
        _ => json_response(StatusCode::NOT_FOUND, &serde_json::json!({"error": "not found"})),
    }
}

async fn submit(req: Request<Incoming>, service: &ProxyService) -> Response<Full<Bytes>> {
    // Verify before reading the body; an unverified caller's payload is
    // never relayed.
    let token_header = req.headers().get("X-Attestation-Token").map(|v| v.as_bytes().to_vec());
    let verified = match service.verify_token(token_header.as_deref()) {
        Ok(verified) => verified,
        Err(err) => return error_response(&ProxyError::Verify(err)),
    };

    let target_header = req
        .headers()
        .get("X-Target-Endpoint")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let Some(endpoint) = target_header else {
        return error_response(&ProxyError::InvalidTarget {
            reason: "X-Target-Endpoint header missing".to_string(),
        });
    };
    let target = match service.check_target(&endpoint) {
        Ok(target) => target,
        Err(err) => return error_response(&err),
    };

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &serde_json::json!({"error": format!("body read failed: {err}")}),
            );
        },
    };

    tracing::info!(
        measurement = %verified.measurement,
        mock = verified.mock,
        target = %target,
        "relaying verified submission"
    );

    match service.relay(target, content_type.as_deref(), body).await {
        Ok((status, upstream_body)) => {
            let mut response = Response::new(Full::new(upstream_body));
            *response.status_mut() =
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            response
        },
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &ProxyError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &serde_json::json!({"error": err.to_string()}))
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
