//! Guest context resolution.
//!
//! Turns a presented token into a point-in-time [`GuestContext`]: the
//! booking, the room assigned right now, and what the guest may do.
//!
//! The room is read from the [`OccupancySource`] on every call. A token never
//! carries a room, so a room move is visible on the next resolution without
//! touching the credential.

use crate::error::{AccessError, InvalidReason, Result};
use crate::lifecycle::TokenLifecycleManager;
use crate::providers::{BookingDirectory, CredentialStore, OccupancySource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stayline_core::booking::{BookingSnapshot, BookingStatus, HotelContact};
use stayline_core::channel::Channel;
use stayline_core::ids::{BookingId, HotelId, RoomNumber, TokenId};

/// How much a resolution must prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTier {
    /// Any usable token, at any stage of the stay.
    ReadOnly,
    /// Additionally in house with a room assigned.
    Action,
}

/// What the guest may do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    /// View booking status.
    pub can_view: bool,
    /// Chat with the front desk.
    pub can_chat: bool,
    /// Order room service.
    pub can_order_room_service: bool,
}

impl Permissions {
    fn derive(booking: &BookingSnapshot, room: Option<&RoomNumber>) -> Self {
        let in_house = booking.is_in_house();
        Self {
            can_view: true,
            can_chat: in_house,
            can_order_room_service: in_house && room.is_some(),
        }
    }
}

/// A resolved guest.
#[derive(Debug, Clone)]
pub struct GuestContext {
    /// Token the guest presented.
    pub token_id: TokenId,
    /// Booking the token is scoped to.
    pub booking: BookingSnapshot,
    /// Room assigned at resolution time.
    pub room: Option<RoomNumber>,
    /// Permitted actions.
    pub permissions: Permissions,
    /// The single realtime channel the guest may subscribe to.
    pub channel: Channel,
}

impl GuestContext {
    /// Booking id.
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        self.booking.id
    }

    /// Serializable view returned by the context endpoint.
    #[must_use]
    pub fn view(&self) -> GuestContextView {
        GuestContextView {
            booking: GuestBookingSummary {
                booking_id: self.booking.id,
                reference: self.booking.reference.clone(),
                status: self.booking.status(),
                arrival: self.booking.arrival,
                departure: self.booking.departure,
                checked_in_at: self.booking.checked_in_at,
                checked_out_at: self.booking.checked_out_at,
                hotel_contact: self.booking.hotel_contact.clone(),
            },
            room: self.room.clone(),
            permissions: self.permissions,
            channel: self.channel.name(),
        }
    }
}

/// Booking fields a guest may see about their own stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestBookingSummary {
    /// Booking id.
    pub booking_id: BookingId,
    /// Confirmation code.
    pub reference: String,
    /// Lifecycle stage.
    pub status: BookingStatus,
    /// Planned arrival.
    pub arrival: DateTime<Utc>,
    /// Planned departure.
    pub departure: DateTime<Utc>,
    /// Actual check-in.
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Actual checkout.
    pub checked_out_at: Option<DateTime<Utc>>,
    /// Public hotel contact.
    pub hotel_contact: HotelContact,
}

/// Body of the guest context endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestContextView {
    /// Booking summary.
    pub booking: GuestBookingSummary,
    /// Current room, if any.
    pub room: Option<RoomNumber>,
    /// Permitted actions.
    pub permissions: Permissions,
    /// Realtime channel name.
    pub channel: String,
}

/// Resolves tokens into guest contexts.
#[derive(Clone)]
pub struct GuestContextResolver<S, D> {
    tokens: TokenLifecycleManager<S>,
    directory: D,
}

impl<S, D> GuestContextResolver<S, D>
where
    S: CredentialStore + Clone + 'static,
    D: BookingDirectory + OccupancySource,
{
    /// Create a resolver.
    #[must_use]
    pub const fn new(tokens: TokenLifecycleManager<S>, directory: D) -> Self {
        Self { tokens, directory }
    }

    /// The token manager used for validation.
    #[must_use]
    pub const fn tokens(&self) -> &TokenLifecycleManager<S> {
        &self.tokens
    }

    /// The booking directory.
    #[must_use]
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    /// Resolve `raw` for `hotel` at `tier`.
    ///
    /// Checks run in a fixed order: token, booking, hotel, stay stage, room.
    /// On success the token's `last_used_at` is updated in the background.
    ///
    /// # Errors
    ///
    /// - [`AccessError::TokenInvalid`] if the token is unusable or its booking is gone.
    /// - [`AccessError::HotelMismatch`] if the booking belongs to another hotel.
    /// - [`AccessError::NotInHouse`] at [`AccessTier::Action`] outside the stay.
    /// - [`AccessError::RoomNotAssigned`] at [`AccessTier::Action`] with no room.
    /// - [`AccessError::Store`] / [`AccessError::Collaborator`] on lookup failures.
    pub async fn resolve(&self, raw: &str, hotel: &HotelId, tier: AccessTier) -> Result<GuestContext> {
        let token = self.tokens.validate(raw).await?;

        let Some(booking) = self
            .directory
            .booking(token.booking_id)
            .await
            .map_err(|e| AccessError::Collaborator(e.to_string()))?
        else {
            return Err(self.tokens.reject(InvalidReason::BookingMissing, &token.token_hash));
        };

        if booking.hotel != *hotel {
            tracing::warn!(
                booking_id = %booking.id,
                booking_hotel = %booking.hotel,
                requested_hotel = %hotel,
                "Guest token presented to the wrong hotel"
            );
            return Err(AccessError::HotelMismatch);
        }

        if tier == AccessTier::Action && !booking.is_in_house() {
            tracing::debug!(booking_id = %booking.id, status = ?booking.status(), "Booking not in house");
            return Err(AccessError::NotInHouse);
        }

        let room = self
            .directory
            .current_room(booking.id)
            .await
            .map_err(|e| AccessError::Collaborator(e.to_string()))?;

        if tier == AccessTier::Action && room.is_none() {
            tracing::debug!(booking_id = %booking.id, "In house without a room");
            return Err(AccessError::RoomNotAssigned);
        }

        self.tokens.touch(&token);

        Ok(GuestContext {
            token_id: token.id,
            permissions: Permissions::derive(&booking, room.as_ref()),
            channel: Channel::guest(booking.id),
            booking,
            room,
        })
    }
}

impl<S, D> std::fmt::Debug for GuestContextResolver<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestContextResolver")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
