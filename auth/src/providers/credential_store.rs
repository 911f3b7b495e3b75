//! Credential store trait.

use crate::error::StoreError;
use crate::token::{GuestAccessToken, RevocationReason, TokenHash};
use chrono::{DateTime, Utc};
use stayline_core::ids::{BookingId, TokenId};

/// Persistent storage for guest access tokens.
///
/// # Invariants
///
/// - At most one row per booking has status `active`. Implementations
///   enforce this with a uniqueness constraint conditioned on status, and
///   report a losing concurrent writer as [`StoreError::Conflict`].
/// - `active -> revoked` is the only status change, and it happens here.
/// - Rows are never deleted.
pub trait CredentialStore: Send + Sync {
    /// Revoke any active token for the new token's booking as
    /// [`RevocationReason::Superseded`] and insert `token`, atomically.
    ///
    /// # Returns
    ///
    /// The id of the token that was superseded, if there was one.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] if a concurrent writer inserted an active
    ///   token for the same booking first. The caller retries.
    /// - [`StoreError::Database`] on any other failure.
    fn replace_active(
        &self,
        token: &GuestAccessToken,
    ) -> impl std::future::Future<Output = Result<Option<TokenId>, StoreError>> + Send;

    /// Look a token up by the hash of its raw value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the lookup fails.
    fn find_by_hash(
        &self,
        hash: &TokenHash,
    ) -> impl std::future::Future<Output = Result<Option<GuestAccessToken>, StoreError>> + Send;

    /// Revoke the active token of `booking_id`, if any.
    ///
    /// # Returns
    ///
    /// The id of the revoked token, or `None` if nothing was active.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    fn revoke_active(
        &self,
        booking_id: BookingId,
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<TokenId>, StoreError>> + Send;

    /// Record a use of the token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the row is gone or
    /// [`StoreError::Database`] if the update fails.
    fn touch(
        &self,
        id: TokenId,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Every token ever issued for `booking_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list_for_booking(
        &self,
        booking_id: BookingId,
    ) -> impl std::future::Future<Output = Result<Vec<GuestAccessToken>, StoreError>> + Send;
}
