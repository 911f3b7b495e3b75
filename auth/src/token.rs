//! Guest access token records and credential hashing.
//!
//! A raw token is 32 random bytes, base64url without padding (43 chars). It
//! is handed to the caller once at issuance. The store only ever sees its
//! SHA-256 digest, also base64url encoded.

use crate::error::InvalidReason;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stayline_core::ids::{BookingId, TokenId};
use std::fmt;

/// Length of an encoded raw token.
pub const RAW_TOKEN_LEN: usize = 43;

/// The secret a guest presents. Never logged, never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct RawToken(String);

impl RawToken {
    /// Generate a fresh token from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Reveal the value to send to the guest.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Hash for storage and lookup.
    #[must_use]
    pub fn hash(&self) -> TokenHash {
        TokenHash::of(&self.0)
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawToken(<redacted>)")
    }
}

/// SHA-256 digest of a raw token, base64url encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);

impl TokenHash {
    /// Hash arbitrary presented input.
    #[must_use]
    pub fn of(raw: &str) -> Self {
        Self(URL_SAFE_NO_PAD.encode(Sha256::digest(raw.as_bytes())))
    }

    /// Wrap a hash read back from storage.
    #[must_use]
    pub const fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    /// Encoded digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First characters of the digest, safe to put in logs.
    #[must_use]
    pub fn log_prefix(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

/// Whether presented input could be a token this system issued.
#[must_use]
pub fn is_well_formed(raw: &str) -> bool {
    raw.len() == RAW_TOKEN_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Token status. `Active -> Revoked` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// Usable until expiry.
    Active,
    /// Terminal.
    Revoked,
}

impl TokenStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }

    /// Parse the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Why a token was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// Guest checked out.
    CheckedOut,
    /// Booking cancelled.
    Cancelled,
    /// Replaced by a newer token for the same booking.
    Superseded,
    /// Staff revoked it by hand.
    Manual,
}

impl RevocationReason {
    /// Database and metrics representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckedOut => "checked_out",
            Self::Cancelled => "cancelled",
            Self::Superseded => "superseded",
            Self::Manual => "manual",
        }
    }

    /// Parse the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "checked_out" => Some(Self::CheckedOut),
            "cancelled" => Some(Self::Cancelled),
            "superseded" => Some(Self::Superseded),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// A stored guest access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestAccessToken {
    /// Row id.
    pub id: TokenId,
    /// Booking the token scopes the guest to.
    pub booking_id: BookingId,
    /// Digest of the raw value.
    pub token_hash: TokenHash,
    /// Lifecycle state.
    pub status: TokenStatus,
    /// Issuance time.
    pub created_at: DateTime<Utc>,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Revocation time.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Revocation reason.
    pub revoked_reason: Option<RevocationReason>,
    /// Last successful use.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl GuestAccessToken {
    /// Classify the token at `now`. Expiry is checked regardless of status.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReason::Expired`] or [`InvalidReason::Revoked`].
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), InvalidReason> {
        if now >= self.expires_at {
            return Err(InvalidReason::Expired);
        }
        match self.status {
            TokenStatus::Active => Ok(()),
            TokenStatus::Revoked => Err(InvalidReason::Revoked),
        }
    }

    /// Apply the one allowed transition. No-op if already revoked.
    pub fn revoke(&mut self, reason: RevocationReason, at: DateTime<Utc>) -> bool {
        if self.status == TokenStatus::Revoked {
            return false;
        }
        self.status = TokenStatus::Revoked;
        self.revoked_at = Some(at);
        self.revoked_reason = Some(reason);
        true
    }
}

/// Audit view of a token, without its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenSummary {
    /// Row id.
    pub id: TokenId,
    /// Booking.
    pub booking_id: BookingId,
    /// Lifecycle state.
    pub status: TokenStatus,
    /// Issuance time.
    pub created_at: DateTime<Utc>,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Revocation time.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Revocation reason.
    pub revoked_reason: Option<RevocationReason>,
    /// Last successful use.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<GuestAccessToken> for TokenSummary {
    fn from(token: GuestAccessToken) -> Self {
        Self {
            id: token.id,
            booking_id: token.booking_id,
            status: token.status,
            created_at: token.created_at,
            expires_at: token.expires_at,
            revoked_at: token.revoked_at,
            revoked_reason: token.revoked_reason,
            last_used_at: token.last_used_at,
        }
    }
}

/// Result of issuance. The only place the raw value ever appears.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Row id of the new token.
    pub token_id: TokenId,
    /// Booking.
    pub booking_id: BookingId,
    /// Raw value to deliver to the guest.
    pub raw: RawToken,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Token this one replaced, if any.
    pub superseded: Option<TokenId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn token(status: TokenStatus, expires_in: Duration) -> GuestAccessToken {
        let now = Utc::now();
        GuestAccessToken {
            id: TokenId(Uuid::nil()),
            booking_id: BookingId(1),
            token_hash: TokenHash::of("x"),
            status,
            created_at: now,
            expires_at: now + expires_in,
            revoked_at: None,
            revoked_reason: None,
            last_used_at: None,
        }
    }

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() {
        let a = RawToken::generate();
        let b = RawToken::generate();
        assert!(is_well_formed(a.expose()));
        assert_eq!(a.expose().len(), RAW_TOKEN_LEN);
        assert_ne!(a, b);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn hash_is_deterministic_and_not_the_raw_value() {
        let raw = RawToken::generate();
        assert_eq!(raw.hash(), TokenHash::of(raw.expose()));
        assert_ne!(raw.hash().as_str(), raw.expose());
    }

    #[test]
    fn debug_never_prints_the_raw_value() {
        let raw = RawToken::generate();
        assert!(!format!("{raw:?}").contains(raw.expose()));
    }

    #[test]
    fn malformed_input_is_detected() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"a".repeat(44)));
        assert!(!is_well_formed(&format!("{}=", "a".repeat(42))));
    }

    #[test]
    fn expiry_beats_status() {
        let expired_active = token(TokenStatus::Active, Duration::seconds(-1));
        assert_eq!(expired_active.check_usable(Utc::now()), Err(InvalidReason::Expired));

        let live_revoked = token(TokenStatus::Revoked, Duration::days(1));
        assert_eq!(live_revoked.check_usable(Utc::now()), Err(InvalidReason::Revoked));
    }

    #[test]
    fn revoke_is_one_way_and_idempotent() {
        let mut t = token(TokenStatus::Active, Duration::days(1));
        let at = Utc::now();
        assert!(t.revoke(RevocationReason::CheckedOut, at));
        assert!(!t.revoke(RevocationReason::Manual, at + Duration::hours(1)));
        assert_eq!(t.revoked_reason, Some(RevocationReason::CheckedOut));
        assert_eq!(t.revoked_at, Some(at));
    }
}
