//! Channel authorization gateway.
//!
//! One entry point for both identity classes:
//!
//! - **Staff session**: any staff channel of the session's hotel.
//! - **Guest token**: exactly the one channel derived from the token's
//!   booking. Names that touch the staff namespace are refused before the
//!   token is looked at.
//!
//! A successful decision is returned as a [`ChannelGrant`] whose `auth`
//! field is an HMAC over socket, channel and expiry. The realtime relay
//! accepts a subscription only with a grant that [`GrantSigner::verify`]
//! accepts for that exact socket and channel.

use crate::config::GatewayConfig;
use crate::context::{AccessTier, GuestContextResolver};
use crate::error::{AccessError, Result};
use crate::providers::{BookingDirectory, CredentialStore, OccupancySource, StaffSessionProvider};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use stayline_core::channel::{Channel, overlaps_staff_namespace};
use stayline_core::ids::{HotelId, StaffId, TokenId};
use stayline_runtime::metrics::ChannelAuthMetrics;

type HmacSha256 = Hmac<Sha256>;

/// Maximum socket id length accepted.
pub const MAX_SOCKET_ID_LEN: usize = 64;

/// A credential presented for channel authorization.
#[derive(Clone)]
pub enum Credential {
    /// Bearer staff session id.
    Staff {
        /// Session id.
        session_id: String,
    },
    /// Guest token for a hotel.
    Guest {
        /// Raw token.
        token: String,
        /// Hotel the guest claims to be staying at.
        hotel: HotelId,
    },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Staff { .. } => f.write_str("Credential::Staff(<redacted>)"),
            Self::Guest { hotel, .. } => write!(f, "Credential::Guest({hotel}, <redacted>)"),
        }
    }
}

/// Who a grant was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantSubject {
    /// A staff member.
    Staff {
        /// Staff member.
        staff_id: StaffId,
    },
    /// A guest token holder.
    Guest {
        /// Token used.
        #[serde(skip)]
        token_id: TokenId,
    },
}

/// A signed permission to subscribe one socket to one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelGrant {
    /// Channel name.
    pub channel: String,
    /// `"{key_id}:{signature}"`.
    pub auth: String,
    /// Grant expiry.
    pub expires_at: DateTime<Utc>,
    /// Who the grant is for.
    pub subject: GrantSubject,
}

/// Signs and verifies channel grants.
#[derive(Clone)]
pub struct GrantSigner {
    key_id: String,
    secret: Vec<u8>,
    ttl: Duration,
}

impl GrantSigner {
    /// Create a signer from gateway configuration.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            key_id: config.signing_key_id.clone(),
            secret: config.signing_secret.clone(),
            ttl: config.grant_ttl,
        }
    }

    /// Grant lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `channel` for `socket_id` until `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Internal`] if the MAC cannot be keyed.
    pub fn sign(&self, socket_id: &str, channel: &str, expires_at: DateTime<Utc>) -> Result<String> {
        let signature = self.signature(socket_id, channel, expires_at)?;
        Ok(format!("{}:{}", self.key_id, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Check a presented grant at `now`.
    #[must_use]
    pub fn verify(
        &self,
        socket_id: &str,
        channel: &str,
        auth: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if now >= expires_at {
            return false;
        }
        let Some((key_id, presented)) = auth.split_once(':') else {
            return false;
        };
        if key_id != self.key_id {
            return false;
        }
        let Ok(presented) = URL_SAFE_NO_PAD.decode(presented) else {
            return false;
        };
        let Ok(expected) = self.signature(socket_id, channel, expires_at) else {
            return false;
        };
        constant_time_eq::constant_time_eq(&presented, &expected)
    }

    fn signature(&self, socket_id: &str, channel: &str, expires_at: DateTime<Utc>) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AccessError::Internal(format!("grant signing key rejected: {e}")))?;
        mac.update(format!("{socket_id}:{channel}:{}", expires_at.timestamp()).as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for GrantSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantSigner")
            .field("key_id", &self.key_id)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Whether `socket_id` has the shape the realtime relay hands out.
#[must_use]
pub fn is_valid_socket_id(socket_id: &str) -> bool {
    !socket_id.is_empty()
        && socket_id.len() <= MAX_SOCKET_ID_LEN
        && socket_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
}

/// The channel authorization gateway.
#[derive(Clone)]
pub struct ChannelGateway<S, D, P> {
    resolver: GuestContextResolver<S, D>,
    sessions: P,
    signer: GrantSigner,
}

impl<S, D, P> ChannelGateway<S, D, P>
where
    S: CredentialStore + Clone + 'static,
    D: BookingDirectory + OccupancySource,
    P: StaffSessionProvider,
{
    /// Create a gateway.
    #[must_use]
    pub const fn new(resolver: GuestContextResolver<S, D>, sessions: P, signer: GrantSigner) -> Self {
        Self {
            resolver,
            sessions,
            signer,
        }
    }

    /// The signer grants are issued with.
    #[must_use]
    pub const fn signer(&self) -> &GrantSigner {
        &self.signer
    }

    /// Decide whether `credential` may subscribe `socket_id` to `channel_name`.
    ///
    /// No partial grants: either the one requested channel is granted, or
    /// an error is returned.
    ///
    /// # Errors
    ///
    /// - [`AccessError::InvalidInput`] for a malformed socket id.
    /// - [`AccessError::ChannelDenied`] for a channel outside the caller's scope.
    /// - [`AccessError::Unauthenticated`] for an unknown or expired staff session.
    /// - Any [`GuestContextResolver::resolve`] error for a guest token.
    pub async fn authorize(
        &self,
        credential: &Credential,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<ChannelGrant> {
        if !is_valid_socket_id(socket_id) {
            ChannelAuthMetrics::record("invalid_request");
            return Err(AccessError::InvalidInput("malformed socket id".to_string()));
        }

        let decision = match credential {
            Credential::Staff { session_id } => self.authorize_staff(session_id, channel_name).await,
            Credential::Guest { token, hotel } => {
                self.authorize_guest(token, hotel, channel_name).await
            }
        };

        let (granted, denied) = match credential {
            Credential::Staff { .. } => ("staff_granted", "staff_denied"),
            Credential::Guest { .. } => ("guest_granted", "guest_denied"),
        };

        match decision {
            Ok(subject) => {
                ChannelAuthMetrics::record(granted);
                let expires_at = self.resolver.tokens().clock().now() + self.signer.ttl();
                let auth = self.signer.sign(socket_id, channel_name, expires_at)?;
                tracing::debug!(channel = channel_name, socket_id, "Channel subscription granted");
                Ok(ChannelGrant {
                    channel: channel_name.to_string(),
                    auth,
                    expires_at,
                    subject,
                })
            }
            Err(e) => {
                ChannelAuthMetrics::record(denied);
                Err(e)
            }
        }
    }

    async fn authorize_staff(&self, session_id: &str, channel_name: &str) -> Result<GrantSubject> {
        let session = self
            .sessions
            .staff_session(session_id)
            .await?
            .filter(|s| s.expires_at > self.resolver.tokens().clock().now())
            .ok_or(AccessError::Unauthenticated)?;

        match Channel::parse(channel_name) {
            Some(Channel::Staff { hotel, .. }) if hotel == session.hotel => Ok(GrantSubject::Staff {
                staff_id: session.staff_id,
            }),
            _ => {
                tracing::warn!(
                    staff_id = %session.staff_id,
                    hotel = %session.hotel,
                    channel = channel_name,
                    "Staff channel request outside own hotel namespace"
                );
                Err(AccessError::ChannelDenied)
            }
        }
    }

    async fn authorize_guest(&self, token: &str, hotel: &HotelId, channel_name: &str) -> Result<GrantSubject> {
        // Decided on the name alone, before the token is examined.
        if overlaps_staff_namespace(channel_name) {
            tracing::warn!(channel = channel_name, "Guest credential asked for a staff channel");
            return Err(AccessError::ChannelDenied);
        }
        if !matches!(Channel::parse(channel_name), Some(Channel::Guest { .. })) {
            tracing::debug!(channel = channel_name, "Guest asked for a name outside the contract");
            return Err(AccessError::ChannelDenied);
        }

        let context = self.resolver.resolve(token, hotel, AccessTier::ReadOnly).await?;

        if context.channel.name() != channel_name {
            tracing::warn!(
                booking_id = %context.booking_id(),
                channel = channel_name,
                "Guest asked for another booking's channel"
            );
            return Err(AccessError::ChannelDenied);
        }

        Ok(GrantSubject::Guest {
            token_id: context.token_id,
        })
    }
}

impl<S, D, P> std::fmt::Debug for ChannelGateway<S, D, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelGateway")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}
