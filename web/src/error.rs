//! HTTP error responses.
//!
//! [`AppError`] is the only error type handlers return. Guest access errors
//! come in through [`AppError::for_guest`] (also the `From` impl) or
//! [`AppError::for_staff`]. Both map the same variant to the same status
//! and code; only staff see the precise reason in the message.
//!
//! | Error | Status | Code |
//! |-------|--------|------|
//! | `TokenInvalid` | 404 | `NOT_FOUND` |
//! | `HotelMismatch` | 403 | `HOTEL_MISMATCH` |
//! | `NotInHouse` | 409 | `NOT_IN_HOUSE` |
//! | `RoomNotAssigned` | 409 | `ROOM_NOT_ASSIGNED` |
//! | `ChannelDenied` | 403 | `CHANNEL_DENIED` |
//! | `Unauthenticated` | 401 | `UNAUTHENTICATED` |
//! | `InvalidInput` | 422 | `INVALID_INPUT` |
//! | system errors | 500 | `INTERNAL_SERVER_ERROR` |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use stayline_auth::AccessError;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: &'static str,
    /// Logged on 5xx, never sent.
    detail: Option<String>,
}

impl AppError {
    /// Create an error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            detail: None,
        }
    }

    /// Attach detail for the server log.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 401, no usable credential.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
    }

    /// 422, request body rejected.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INPUT", message)
    }

    /// 404 with the uniform guest message.
    #[must_use]
    pub fn not_available() -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Not available")
    }

    /// 500, detail logged only.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
        .with_detail(detail)
    }

    /// Map an access error for a guest caller.
    ///
    /// Messages are generic; a token rejection says nothing about why.
    #[must_use]
    pub fn for_guest(err: AccessError) -> Self {
        match err {
            AccessError::TokenInvalid => Self::not_available(),
            AccessError::HotelMismatch => {
                Self::new(StatusCode::FORBIDDEN, "HOTEL_MISMATCH", "Not available at this hotel")
            }
            AccessError::NotInHouse => Self::new(
                StatusCode::CONFLICT,
                "NOT_IN_HOUSE",
                "Available once you have checked in",
            ),
            AccessError::RoomNotAssigned => Self::new(
                StatusCode::CONFLICT,
                "ROOM_NOT_ASSIGNED",
                "Available once a room is assigned",
            ),
            AccessError::ChannelDenied => {
                Self::new(StatusCode::FORBIDDEN, "CHANNEL_DENIED", "Channel not available")
            }
            AccessError::Unauthenticated => Self::unauthenticated("Authentication required"),
            AccessError::InvalidInput(message) => Self::invalid_input(message),
            system @ (AccessError::Store(_) | AccessError::Collaborator(_) | AccessError::Internal(_)) => {
                Self::internal(system.to_string())
            }
        }
    }

    /// Map an access error for a staff caller: same status and code, with
    /// the variant's own message.
    #[must_use]
    pub fn for_staff(err: AccessError) -> Self {
        if err.is_system_error() {
            return Self::for_guest(err);
        }
        let message = err.to_string();
        let mut mapped = Self::for_guest(err);
        mapped.message = message;
        mapped
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        Self::for_guest(err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = self.code,
                detail = self.detail.as_deref().unwrap_or(""),
                "Request failed"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stayline_auth::StoreError;

    #[test]
    fn guest_taxonomy_maps_to_fixed_statuses() {
        let cases = [
            (AccessError::TokenInvalid, StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AccessError::HotelMismatch, StatusCode::FORBIDDEN, "HOTEL_MISMATCH"),
            (AccessError::NotInHouse, StatusCode::CONFLICT, "NOT_IN_HOUSE"),
            (AccessError::RoomNotAssigned, StatusCode::CONFLICT, "ROOM_NOT_ASSIGNED"),
            (AccessError::ChannelDenied, StatusCode::FORBIDDEN, "CHANNEL_DENIED"),
            (AccessError::Unauthenticated, StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            (
                AccessError::InvalidInput("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_INPUT",
            ),
        ];
        for (err, status, code) in cases {
            let mapped = AppError::for_guest(err);
            assert_eq!(mapped.status(), status);
            assert_eq!(mapped.code(), code);
        }
    }

    #[test]
    fn token_rejection_message_is_uniform() {
        assert_eq!(
            AppError::for_guest(AccessError::TokenInvalid).to_string(),
            "[NOT_FOUND] Not available"
        );
    }

    #[test]
    fn system_errors_hide_detail() {
        let err = AppError::for_staff(AccessError::Store(StoreError::Database("pool timed out".into())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("pool"));
    }

    #[test]
    fn staff_see_the_precise_reason() {
        let err = AppError::for_staff(AccessError::ChannelDenied);
        assert_eq!(err.code(), "CHANNEL_DENIED");
        assert_eq!(err.to_string(), "[CHANNEL_DENIED] Channel denied");
    }
}
