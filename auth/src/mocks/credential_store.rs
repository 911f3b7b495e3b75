//! Mock credential store for testing.

use crate::error::StoreError;
use crate::providers::CredentialStore;
use crate::token::{GuestAccessToken, RevocationReason, TokenHash, TokenStatus};
use chrono::{DateTime, Utc};
use stayline_core::ids::{BookingId, TokenId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock credential store.
///
/// Replacement runs in two locked phases with a yield in between, the way
/// two concurrent database transactions interleave. The insert phase checks
/// the one-active-per-booking rule and reports a loser as
/// [`StoreError::Conflict`].
#[derive(Debug, Clone, Default)]
pub struct MockCredentialStore {
    tokens: Arc<Mutex<HashMap<TokenId, GuestAccessToken>>>,
    unavailable: Arc<AtomicBool>,
    forced_conflicts: Arc<AtomicUsize>,
}

impl MockCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::Database`].
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Fail the next `n` inserts with [`StoreError::Conflict`].
    pub fn force_conflicts(&self, n: usize) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// All rows (for testing).
    #[must_use]
    pub fn all(&self) -> Vec<GuestAccessToken> {
        self.lock().values().cloned().collect()
    }

    /// Rows of one booking with status `active`.
    #[must_use]
    pub fn active_for(&self, booking_id: BookingId) -> Vec<GuestAccessToken> {
        self.lock()
            .values()
            .filter(|t| t.booking_id == booking_id && t.status == TokenStatus::Active)
            .cloned()
            .collect()
    }

    /// Overwrite a row, bypassing every rule (for testing).
    pub fn put(&self, token: GuestAccessToken) {
        self.lock().insert(token.id, token);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TokenId, GuestAccessToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("credential store unavailable".into()));
        }
        Ok(())
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn revoke_locked(
        tokens: &mut HashMap<TokenId, GuestAccessToken>,
        booking_id: BookingId,
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> Option<TokenId> {
        let active = tokens
            .values_mut()
            .find(|t| t.booking_id == booking_id && t.status == TokenStatus::Active)?;
        active.revoke(reason, at);
        Some(active.id)
    }
}

impl CredentialStore for MockCredentialStore {
    async fn replace_active(&self, token: &GuestAccessToken) -> Result<Option<TokenId>, StoreError> {
        self.check_available()?;

        let superseded = Self::revoke_locked(
            &mut self.lock(),
            token.booking_id,
            RevocationReason::Superseded,
            token.created_at,
        );

        tokio::task::yield_now().await;

        let mut tokens = self.lock();
        let taken = tokens
            .values()
            .any(|t| t.booking_id == token.booking_id && t.status == TokenStatus::Active);
        if taken || self.take_forced_conflict() {
            return Err(StoreError::Conflict(format!(
                "booking {} already has an active token",
                token.booking_id
            )));
        }
        tokens.insert(token.id, token.clone());
        Ok(superseded)
    }

    async fn find_by_hash(&self, hash: &TokenHash) -> Result<Option<GuestAccessToken>, StoreError> {
        self.check_available()?;
        let tokens = self.lock();
        // Compare against every row so timing does not depend on where the match is.
        let mut found = None;
        for token in tokens.values() {
            if constant_time_eq::constant_time_eq(
                token.token_hash.as_str().as_bytes(),
                hash.as_str().as_bytes(),
            ) {
                found = Some(token.clone());
            }
        }
        Ok(found)
    }

    async fn revoke_active(
        &self,
        booking_id: BookingId,
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> Result<Option<TokenId>, StoreError> {
        self.check_available()?;
        Ok(Self::revoke_locked(&mut self.lock(), booking_id, reason, at))
    }

    async fn touch(&self, id: TokenId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check_available()?;
        let mut tokens = self.lock();
        let token = tokens.get_mut(&id).ok_or(StoreError::NotFound)?;
        token.last_used_at = Some(at);
        Ok(())
    }

    async fn list_for_booking(&self, booking_id: BookingId) -> Result<Vec<GuestAccessToken>, StoreError> {
        self.check_available()?;
        let mut rows: Vec<_> = self
            .lock()
            .values()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }
}
