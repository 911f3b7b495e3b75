//! Stay lifecycle hooks.
//!
//! The call surface the reservations write paths use. Each hook pairs the
//! token consequence of a stay transition with its realtime event, and
//! queues both in the caller's outbox. Nothing reaches the credential store
//! or the broker unless the caller's own change commits:
//!
//! ```text
//! hook ──► outbox: event envelopes + token follow-up
//!             │
//!   commit ───┼──► token issued / revoked ──► envelopes published
//!   rollback ─┴──► all discarded, tokens untouched
//! ```
//!
//! A follow-up that fails after the commit is logged and reported by
//! [`stayline_runtime::DispatchHandle::follow_ups_failed`]; the write
//! itself is idempotent, so the caller may retry it with
//! [`StayHooks::reissue_token`] or [`crate::TokenLifecycleManager::revoke`].

use crate::error::Result;
use crate::lifecycle::TokenLifecycleManager;
use crate::providers::CredentialStore;
use crate::token::{IssuedToken, RevocationReason};
use stayline_core::booking::BookingSnapshot;
use stayline_core::events::StayEvent;
use stayline_core::ids::{BookingId, RoomNumber};
use stayline_core::outbox::{FollowUpError, Outbox};
use stayline_runtime::emitter::EventEmitter;

/// Hooks called by the reservations write paths.
#[derive(Clone)]
pub struct StayHooks<S> {
    tokens: TokenLifecycleManager<S>,
    emitter: EventEmitter,
}

impl<S> StayHooks<S>
where
    S: CredentialStore + Clone + 'static,
{
    /// Create the hooks.
    #[must_use]
    pub const fn new(tokens: TokenLifecycleManager<S>, emitter: EventEmitter) -> Self {
        Self { tokens, emitter }
    }

    /// The emission engine, for collaborators that emit without a token change.
    #[must_use]
    pub const fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// A booking was created: mint its first token and announce it.
    ///
    /// The returned raw token only validates once the outbox's unit of work
    /// commits.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AccessError::Internal`] if the event cannot be built,
    /// or [`crate::AccessError::InvalidInput`] if the booking's stay already
    /// ended beyond the grace window. Nothing is queued in either case.
    pub fn booking_created(&self, outbox: &mut Outbox, booking: &BookingSnapshot) -> Result<IssuedToken> {
        let (token, raw) = self.tokens.mint_for_stay(booking.id, Some(booking.departure))?;
        self.emitter.emit(
            outbox,
            &StayEvent::BookingCreated {
                booking: booking.clone(),
            },
        )?;

        let issued = IssuedToken {
            token_id: token.id,
            booking_id: booking.id,
            raw,
            expires_at: token.expires_at,
            superseded: None,
        };
        let tokens = self.tokens.clone();
        outbox.after_commit("issue_guest_token", async move {
            tokens
                .store_minted(&token)
                .await
                .map(|_| ())
                .map_err(FollowUpError::from)
        });
        Ok(issued)
    }

    /// Replace the booking's token, e.g. when the guest lost the link.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AccessError::Store`] if issuance fails.
    pub async fn reissue_token(&self, booking: &BookingSnapshot) -> Result<IssuedToken> {
        self.tokens.issue(booking.id, Some(booking.departure)).await
    }

    /// The guest checked in.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AccessError::Internal`] if the event cannot be built.
    pub fn checked_in(&self, outbox: &mut Outbox, booking: &BookingSnapshot, room: Option<RoomNumber>) -> Result<()> {
        self.emitter.emit(
            outbox,
            &StayEvent::CheckedIn {
                booking: booking.clone(),
                room,
            },
        )?;
        Ok(())
    }

    /// The guest checked out: revoke the token on commit and announce it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AccessError::Internal`] if the event cannot be built.
    pub fn checked_out(&self, outbox: &mut Outbox, booking: &BookingSnapshot) -> Result<()> {
        self.emitter.emit(
            outbox,
            &StayEvent::CheckedOut {
                booking: booking.clone(),
            },
        )?;
        self.revoke_on_commit(outbox, booking.id, RevocationReason::CheckedOut);
        Ok(())
    }

    /// The booking was cancelled: revoke the token on commit and announce it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AccessError::Internal`] if the event cannot be built.
    pub fn cancelled(&self, outbox: &mut Outbox, booking: &BookingSnapshot, reason: Option<String>) -> Result<()> {
        self.emitter.emit(
            outbox,
            &StayEvent::BookingCancelled {
                booking: booking.clone(),
                reason,
            },
        )?;
        self.revoke_on_commit(outbox, booking.id, RevocationReason::Cancelled);
        Ok(())
    }

    fn revoke_on_commit(&self, outbox: &mut Outbox, booking_id: BookingId, reason: RevocationReason) {
        let tokens = self.tokens.clone();
        outbox.after_commit("revoke_guest_token", async move {
            tokens
                .revoke(booking_id, reason)
                .await
                .map(|_| ())
                .map_err(FollowUpError::from)
        });
    }

    /// Staff moved the guest. No token change; the next resolution reads
    /// the new room.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AccessError::Internal`] if the event cannot be built.
    pub fn room_moved(
        &self,
        outbox: &mut Outbox,
        booking: &BookingSnapshot,
        from: Option<RoomNumber>,
        to: RoomNumber,
    ) -> Result<()> {
        self.emitter.emit(
            outbox,
            &StayEvent::RoomMoved {
                booking: booking.clone(),
                from,
                to,
            },
        )?;
        Ok(())
    }
}

impl<S> std::fmt::Debug for StayHooks<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StayHooks")
            .field("tokens", &self.tokens)
            .field("emitter", &self.emitter)
            .finish()
    }
}
