//! Per-request trace-id propagation and latency logging.
//!
//! Accepts an `x-trace-id` header from the caller (must be a UUID) or
//! generates one, stamps it on the request and the response, and wraps the
//! whole request in a tracing span. Bodies are never buffered here, so video
//! downloads flow through untouched.

use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

pub async fn trace_middleware(mut req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let header_value = HeaderValue::from_str(&trace_id.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("invalid"));

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        req.headers_mut().insert(X_TRACE_ID, header_value.clone());
        let mut response = next.run(req).await;
        response.headers_mut().insert(X_TRACE_ID, header_value);

        info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis(),
            "request finished"
        );
        response
    }
    .instrument(span)
    .await
}
