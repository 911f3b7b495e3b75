//! Guest access configuration.
//!
//! Values are provided by the application (see the server's env loader);
//! defaults are what production runs with unless overridden.

use chrono::{DateTime, Duration, Utc};

/// How long guest access tokens live.
#[derive(Debug, Clone)]
pub struct TokenPolicy {
    /// Validity after the planned end of stay.
    ///
    /// Default: 30 days
    pub grace_after_stay: Duration,

    /// Validity from issuance when the stay end is unknown.
    ///
    /// Default: 30 days
    pub fallback_ttl: Duration,
}

impl TokenPolicy {
    /// Set the grace window after the stay.
    #[must_use]
    pub const fn with_grace_after_stay(mut self, grace: Duration) -> Self {
        self.grace_after_stay = grace;
        self
    }

    /// Set the fallback lifetime.
    #[must_use]
    pub const fn with_fallback_ttl(mut self, ttl: Duration) -> Self {
        self.fallback_ttl = ttl;
        self
    }

    /// Expiry for a token issued at `now` for a stay ending at `stay_ends_at`.
    ///
    /// Never earlier than `now + grace`, so a token reissued after the
    /// planned departure still gets the full grace window.
    #[must_use]
    pub fn expires_at(&self, now: DateTime<Utc>, stay_ends_at: Option<DateTime<Utc>>) -> DateTime<Utc> {
        match stay_ends_at {
            Some(end) => end.max(now) + self.grace_after_stay,
            None => now + self.fallback_ttl,
        }
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            grace_after_stay: Duration::days(30),
            fallback_ttl: Duration::days(30),
        }
    }
}

/// Channel authorization gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Identifier of the signing key, prefixed to every grant.
    pub signing_key_id: String,

    /// HMAC secret for grants.
    pub signing_secret: Vec<u8>,

    /// How long a grant may be presented to the relay.
    ///
    /// Default: 10 minutes
    pub grant_ttl: Duration,
}

impl GatewayConfig {
    /// Create gateway configuration for a signing key.
    #[must_use]
    pub fn new(signing_key_id: impl Into<String>, signing_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            signing_key_id: signing_key_id.into(),
            signing_secret: signing_secret.into(),
            grant_ttl: Duration::minutes(10),
        }
    }

    /// Set grant lifetime.
    #[must_use]
    pub const fn with_grant_ttl(mut self, ttl: Duration) -> Self {
        self.grant_ttl = ttl;
        self
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("signing_key_id", &self.signing_key_id)
            .field("signing_secret", &"<redacted>")
            .field("grant_ttl", &self.grant_ttl)
            .finish()
    }
}
