//! Token lifecycle manager.
//!
//! Issues, validates, revokes and touches guest access tokens against a
//! [`CredentialStore`]. The one-active-token rule is the store's job; this
//! component only retries when the store reports a conflicting writer.
//!
//! # Validation
//!
//! ```text
//! raw ──► well-formed? ──► hash ──► find_by_hash ──► expired? ──► revoked? ──► Ok
//!            │ no                       │ none           │ yes        │ yes
//!            ▼                          ▼                ▼            ▼
//!         Malformed                 NotFound          Expired      Revoked
//!            └──────────────────────────┴────────────────┴────────────┘
//!                                       │
//!                              AccessError::TokenInvalid
//! ```
//!
//! The reason is logged with a short prefix of the hash and counted in
//! `stayline_token_validations_total{outcome}`; the caller only ever sees
//! [`AccessError::TokenInvalid`].

use crate::config::TokenPolicy;
use crate::error::{AccessError, InvalidReason, Result, StoreError};
use crate::providers::CredentialStore;
use crate::token::{
    GuestAccessToken, IssuedToken, RawToken, RevocationReason, TokenHash, TokenStatus,
    TokenSummary, is_well_formed,
};
use chrono::{DateTime, Utc};
use stayline_core::environment::{Clock, IdGenerator};
use stayline_core::ids::{BookingId, TokenId};
use stayline_runtime::metrics::TokenMetrics;
use stayline_runtime::retry::{RetryPolicy, retry_with_predicate};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Issues and checks guest access tokens.
#[derive(Clone)]
pub struct TokenLifecycleManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    policy: TokenPolicy,
    retry: RetryPolicy,
}

impl<S> TokenLifecycleManager<S>
where
    S: CredentialStore + Clone + 'static,
{
    /// Create a manager with the default conflict retry policy.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>, policy: TokenPolicy) -> Self {
        Self {
            store,
            clock,
            ids,
            policy,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used when issuance hits a conflict.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The expiry policy in force.
    #[must_use]
    pub const fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The clock the manager judges expiry by.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Issue a fresh token for `booking_id`, superseding any active one.
    ///
    /// Expiry is `stay_ends_at` plus the grace window, or the fallback
    /// lifetime when the end of stay is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Store`] if the store fails, or keeps reporting
    /// a conflict after every retry.
    pub async fn issue(
        &self,
        booking_id: BookingId,
        stay_ends_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedToken> {
        let expires_at = self.policy.expires_at(self.clock.now(), stay_ends_at);
        self.issue_with_expiry(booking_id, expires_at).await
    }

    /// Issue a fresh token with an explicit expiry.
    ///
    /// # Errors
    ///
    /// - [`AccessError::InvalidInput`] if `expires_at` is not in the future.
    /// - [`AccessError::Store`] if the store fails.
    pub async fn issue_with_expiry(
        &self,
        booking_id: BookingId,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        let (token, raw) = self.mint(booking_id, expires_at)?;
        let superseded = self.store_minted(&token).await?;
        Ok(IssuedToken {
            token_id: token.id,
            booking_id,
            raw,
            expires_at,
            superseded,
        })
    }

    /// Build a new token row and its raw value without storing anything.
    ///
    /// Expiry follows the same policy as [`Self::issue`].
    pub(crate) fn mint_for_stay(
        &self,
        booking_id: BookingId,
        stay_ends_at: Option<DateTime<Utc>>,
    ) -> Result<(GuestAccessToken, RawToken)> {
        let expires_at = self.policy.expires_at(self.clock.now(), stay_ends_at);
        self.mint(booking_id, expires_at)
    }

    fn mint(&self, booking_id: BookingId, expires_at: DateTime<Utc>) -> Result<(GuestAccessToken, RawToken)> {
        let now = self.clock.now();
        if expires_at <= now {
            return Err(AccessError::InvalidInput(
                "token expiry must be in the future".to_string(),
            ));
        }

        let raw = RawToken::generate();
        let token = GuestAccessToken {
            id: TokenId(self.ids.next_uuid()),
            booking_id,
            token_hash: raw.hash(),
            status: TokenStatus::Active,
            created_at: now,
            expires_at,
            revoked_at: None,
            revoked_reason: None,
            last_used_at: None,
        };
        Ok((token, raw))
    }

    /// Make a minted token the booking's active one, retrying on conflict.
    ///
    /// Returns the token it superseded, if any.
    pub(crate) async fn store_minted(&self, token: &GuestAccessToken) -> Result<Option<TokenId>> {
        let superseded = retry_with_predicate(
            self.retry.clone(),
            || self.store.replace_active(token),
            StoreError::is_conflict,
        )
        .await?;

        TokenMetrics::record_issued();
        if let Some(previous) = superseded {
            TokenMetrics::record_revoked(RevocationReason::Superseded.as_str());
            tracing::info!(
                booking_id = %token.booking_id,
                token_id = %previous,
                "Superseded previous guest token"
            );
        }
        tracing::info!(
            booking_id = %token.booking_id,
            token_id = %token.id,
            hash_prefix = token.token_hash.log_prefix(),
            expires_at = %token.expires_at,
            "Issued guest token"
        );
        Ok(superseded)
    }

    /// Check a presented raw token.
    ///
    /// # Errors
    ///
    /// - [`AccessError::TokenInvalid`] for every rejection, whatever the cause.
    /// - [`AccessError::Store`] if the lookup itself fails.
    pub async fn validate(&self, raw: &str) -> Result<GuestAccessToken> {
        let hash = TokenHash::of(raw);
        if !is_well_formed(raw) {
            return Err(self.reject(InvalidReason::Malformed, &hash));
        }

        let Some(token) = self.store.find_by_hash(&hash).await? else {
            return Err(self.reject(InvalidReason::NotFound, &hash));
        };

        if let Err(reason) = token.check_usable(self.clock.now()) {
            return Err(self.reject(reason, &hash));
        }

        TokenMetrics::record_validation("valid");
        Ok(token)
    }

    /// Log and count a rejection, returning the uniform external error.
    pub(crate) fn reject(&self, reason: InvalidReason, hash: &TokenHash) -> AccessError {
        match reason {
            InvalidReason::Malformed | InvalidReason::NotFound => tracing::debug!(
                reason = reason.as_str(),
                hash_prefix = hash.log_prefix(),
                "Guest token rejected"
            ),
            InvalidReason::Expired | InvalidReason::Revoked | InvalidReason::BookingMissing => {
                tracing::warn!(
                    reason = reason.as_str(),
                    hash_prefix = hash.log_prefix(),
                    at = %self.clock.now(),
                    "Guest token rejected"
                );
            }
        }
        TokenMetrics::record_validation(reason.as_str());
        reason.into()
    }

    /// Revoke the active token of `booking_id`.
    ///
    /// Idempotent: with nothing active this is a no-op returning `None`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Store`] if the store fails.
    pub async fn revoke(
        &self,
        booking_id: BookingId,
        reason: RevocationReason,
    ) -> Result<Option<TokenId>> {
        let revoked = self
            .store
            .revoke_active(booking_id, reason, self.clock.now())
            .await?;

        match revoked {
            Some(token_id) => {
                TokenMetrics::record_revoked(reason.as_str());
                tracing::info!(
                    booking_id = %booking_id,
                    token_id = %token_id,
                    reason = reason.as_str(),
                    "Revoked guest token"
                );
            }
            None => tracing::debug!(
                booking_id = %booking_id,
                reason = reason.as_str(),
                "No active guest token to revoke"
            ),
        }
        Ok(revoked)
    }

    /// Record a use of `token` in the background.
    ///
    /// Never fails the caller. The returned handle may be awaited or dropped.
    pub fn touch(&self, token: &GuestAccessToken) -> JoinHandle<()> {
        let store = self.store.clone();
        let token_id = token.id;
        let at = self.clock.now();
        tokio::spawn(async move {
            if let Err(e) = store.touch(token_id, at).await {
                tracing::warn!(token_id = %token_id, error = %e, "Failed to record guest token use");
            }
        })
    }

    /// Every token issued for `booking_id`, newest first, without hashes.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Store`] if the store fails.
    pub async fn history(&self, booking_id: BookingId) -> Result<Vec<TokenSummary>> {
        let rows = self.store.list_for_booking(booking_id).await?;
        Ok(rows.into_iter().map(TokenSummary::from).collect())
    }
}

impl<S> std::fmt::Debug for TokenLifecycleManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("policy", &self.policy)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
