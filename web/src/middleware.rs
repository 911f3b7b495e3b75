//! Correlation id middleware.
//!
//! Reads `X-Correlation-ID` (or generates one), stores it in request
//! extensions for [`crate::extractors::CorrelationId`], opens a tracing span
//! with it, and echoes it on the response. Handlers pass it on to the
//! events they emit, so a client request and the realtime deliveries it
//! causes share one id.

use crate::extractors::CorrelationId;
use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Middleware function; install with `axum::middleware::from_fn(propagate_correlation_id)`.
pub async fn propagate_correlation_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    req.extensions_mut().insert(CorrelationId(id));

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
