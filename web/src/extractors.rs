//! Request extractors.
//!
//! - [`GuestToken`]: raw token from `X-Guest-Token`
//! - [`StaffBearer`]: staff session id from `Authorization: Bearer ...`
//! - [`CorrelationId`]: from the correlation middleware, the header, or fresh
//!
//! Credentials are never logged by these extractors.

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

/// Header carrying the guest's raw access token.
pub const GUEST_TOKEN_HEADER: &str = "X-Guest-Token";

/// Raw guest access token.
///
/// A missing or empty header is rejected with the same response as an
/// unknown token.
#[derive(Clone)]
pub struct GuestToken(pub String);

impl std::fmt::Debug for GuestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GuestToken(<redacted>)")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for GuestToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(GUEST_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Self(t.to_string()))
            .ok_or_else(AppError::not_available)
    }
}

/// Staff session id from a bearer `Authorization` header.
#[derive(Clone)]
pub struct StaffBearer(pub String);

impl std::fmt::Debug for StaffBearer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaffBearer(<redacted>)")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffBearer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Self(t.to_string()))
            .ok_or_else(|| AppError::unauthenticated("Bearer session required"))
    }
}

/// Correlation ID for request tracing and event correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }
        let id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        Ok(Self(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn guest_token_is_read_from_its_header() {
        let mut p = parts(&[(GUEST_TOKEN_HEADER, " abc ")]);
        let token = GuestToken::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(token.0, "abc");
    }

    #[tokio::test]
    async fn missing_guest_token_looks_like_an_unknown_one() {
        let mut p = parts(&[]);
        let err = GuestToken::from_request_parts(&mut p, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bearer_requires_the_scheme() {
        let mut ok = parts(&[("Authorization", "Bearer sess-1")]);
        assert_eq!(StaffBearer::from_request_parts(&mut ok, &()).await.unwrap().0, "sess-1");

        let mut basic = parts(&[("Authorization", "Basic abc")]);
        let err = StaffBearer::from_request_parts(&mut basic, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correlation_id_prefers_header_then_generates() {
        let id = Uuid::new_v4();
        let mut p = parts(&[(CORRELATION_ID_HEADER, &id.to_string())]);
        assert_eq!(CorrelationId::from_request_parts(&mut p, &()).await.unwrap().0, id);

        let mut invalid = parts(&[(CORRELATION_ID_HEADER, "not-a-uuid")]);
        assert_ne!(CorrelationId::from_request_parts(&mut invalid, &()).await.unwrap().0, Uuid::nil());
    }
}
