//! Event envelope: the normalized unit published to a channel.
//!
//! An envelope is `{category, type, payload, meta}`. It is transient: this
//! workspace never persists envelopes, it only queues them in an
//! [`Outbox`](crate::outbox::Outbox) until the surrounding unit of work commits.
//!
//! # Wire Format
//!
//! Envelopes travel as JSON so browser subscribers can read them directly:
//!
//! ```json
//! {
//!   "category": "booking",
//!   "type": "checked_in",
//!   "payload": { "booking_id": 1042, "status": "checked_in" },
//!   "meta": {
//!     "event_id": "0d1e...",
//!     "ts": "2025-01-01T15:00:00Z",
//!     "scope": { "hotel": "grand-plaza", "booking": 1042 },
//!     "correlation_id": "7a4c...",
//!     "audience": "guest"
//!   }
//! }
//! ```

use crate::channel::{Audience, StaffTopic};
use crate::ids::{BookingId, EventId, HotelId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error types for envelope encoding.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Failed to serialize an envelope or payload.
    #[error("Failed to serialize envelope: {0}")]
    SerializationError(String),

    /// Failed to deserialize an envelope.
    #[error("Failed to deserialize envelope: {0}")]
    DeserializationError(String),
}

/// Domain an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Booking lifecycle.
    Booking,
    /// Guest chat.
    Chat,
    /// Room-service orders.
    RoomService,
}

impl Category {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Chat => "chat",
            Self::RoomService => "room_service",
        }
    }

    /// Staff topic that carries events of this category.
    #[must_use]
    pub const fn staff_topic(self) -> StaffTopic {
        match self {
            Self::Booking => StaffTopic::Bookings,
            Self::Chat => StaffTopic::Chat,
            Self::RoomService => StaffTopic::RoomService,
        }
    }
}

/// Hotel and booking an event is confined to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventScope {
    /// Hotel the change happened in.
    pub hotel: HotelId,
    /// Booking the change concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub booking: Option<BookingId>,
}

/// Envelope metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Unique per envelope. Consumers treat a repeated id as a no-op.
    pub event_id: EventId,
    /// When the envelope was built.
    pub ts: DateTime<Utc>,
    /// Confinement of the event.
    pub scope: EventScope,
    /// Shared by the staff and guest projections of one logical change.
    pub correlation_id: Uuid,
    /// Which projection this envelope carries.
    pub audience: Audience,
}

/// A normalized event ready for publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Domain name.
    pub category: Category,
    /// Action name (e.g. `checked_in`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Audience-specific body.
    pub payload: serde_json::Value,
    /// Identity, time and scope.
    pub meta: EventMeta,
}

impl EventEnvelope {
    /// The envelope's unique id.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.meta.event_id
    }

    /// Encode as JSON bytes for the broker.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::SerializationError`] if the payload cannot be encoded.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::SerializationError(e.to_string()))
    }

    /// Decode from JSON bytes received from the broker.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::DeserializationError`] if the bytes are not a valid envelope.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::DeserializationError(e.to_string()))
    }
}
