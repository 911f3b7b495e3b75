//! Liveness endpoint for load balancers.

use axum::http::StatusCode;

/// `GET /health`. Does not touch any store.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
