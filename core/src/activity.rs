//! Guest activity records created through action-tier endpoints.
//!
//! Each record carries the room that was assigned at creation time as a plain
//! value. A later room move does not touch existing records.

use crate::ids::{BookingId, HotelId, RoomNumber, TokenId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message sent by a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    /// Record id.
    pub id: Uuid,
    /// Booking the message belongs to.
    pub booking: BookingId,
    /// Hotel the booking belongs to.
    pub hotel: HotelId,
    /// Message text.
    pub body: String,
    /// Room assigned when the message was sent.
    pub room_snapshot: RoomNumber,
    /// Token used to send the message (audit).
    pub token_id: TokenId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One line of a room-service order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Menu item name.
    pub item: String,
    /// Quantity, at least 1.
    pub quantity: u32,
    /// Free-text note for the kitchen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A room-service order placed by a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomServiceOrderRecord {
    /// Record id.
    pub id: Uuid,
    /// Booking the order belongs to.
    pub booking: BookingId,
    /// Hotel the booking belongs to.
    pub hotel: HotelId,
    /// Ordered lines.
    pub lines: Vec<OrderLine>,
    /// Room assigned when the order was placed; delivery goes here.
    pub room_snapshot: RoomNumber,
    /// Token used to place the order (audit).
    pub token_id: TokenId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
