//! Error types for guest access and channel authorization.
//!
//! Two layers:
//!
//! - [`AccessError`] is what callers see. Its guest-facing variants are the
//!   taxonomy the HTTP layer maps one-to-one onto responses.
//! - [`InvalidReason`] is why a token was rejected. It is logged and counted
//!   but never leaves this crate: every reason collapses into
//!   [`AccessError::TokenInvalid`].

use stayline_runtime::emitter::EmitError;
use thiserror::Error;

/// Result type alias for guest access operations.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Errors from the lifecycle manager, resolver, gateway and action service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    // ═══════════════════════════════════════════════════════════
    // Guest-facing taxonomy
    // ═══════════════════════════════════════════════════════════

    /// Token missing, malformed, unknown, expired or revoked.
    ///
    /// Deliberately carries no detail.
    #[error("Token invalid")]
    TokenInvalid,

    /// The token's booking belongs to a different hotel.
    #[error("Booking does not belong to this hotel")]
    HotelMismatch,

    /// The booking is not checked in (or already checked out / cancelled).
    #[error("Booking is not in house")]
    NotInHouse,

    /// The booking is in house but has no room right now.
    #[error("No room is assigned to this booking")]
    RoomNotAssigned,

    /// The requested channel is outside the caller's scope.
    #[error("Channel denied")]
    ChannelDenied,

    // ═══════════════════════════════════════════════════════════
    // Caller errors
    // ═══════════════════════════════════════════════════════════

    /// Staff session missing, unknown or expired.
    #[error("Staff session invalid")]
    Unauthenticated,

    /// Request body failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ═══════════════════════════════════════════════════════════
    // System errors (details logged, never shown to guests)
    // ═══════════════════════════════════════════════════════════

    /// Credential or activity store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Booking or occupancy lookup failure.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Anything else that should not happen.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    /// Whether this is one of the guest-facing taxonomy variants.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stayline_auth::AccessError;
    /// assert!(AccessError::TokenInvalid.is_guest_facing());
    /// assert!(!AccessError::Internal("boom".into()).is_guest_facing());
    /// ```
    #[must_use]
    pub const fn is_guest_facing(&self) -> bool {
        matches!(
            self,
            Self::TokenInvalid
                | Self::HotelMismatch
                | Self::NotInHouse
                | Self::RoomNotAssigned
                | Self::ChannelDenied
        )
    }

    /// Whether this is a system failure rather than a decision about the caller.
    #[must_use]
    pub const fn is_system_error(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Collaborator(_) | Self::Internal(_)
        )
    }
}

/// Errors raised by store adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. Retryable.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The row to update does not exist.
    #[error("Not found")]
    NotFound,

    /// Any other database or cache failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether the write should be retried.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Why a presented token was rejected. Internal only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Not the shape of a token this system issues.
    Malformed,
    /// No token with that hash.
    NotFound,
    /// `now >= expires_at`.
    Expired,
    /// Status is `revoked`.
    Revoked,
    /// The token's booking no longer exists in the directory.
    BookingMissing,
}

impl InvalidReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::BookingMissing => "booking_missing",
        }
    }
}

impl From<InvalidReason> for AccessError {
    fn from(_: InvalidReason) -> Self {
        Self::TokenInvalid
    }
}

impl From<EmitError> for AccessError {
    fn from(e: EmitError) -> Self {
        Self::Internal(e.to_string())
    }
}
