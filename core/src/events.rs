//! The closed set of realtime events and their audience projections.
//!
//! Every `(category, type)` pair that may ever be published is a variant of
//! [`StayEvent`]. Each variant has exactly one staff projection and one guest
//! projection, both built from typed view structs below, so the payload shape
//! cannot drift between call sites.
//!
//! | Category       | Type            | Staff-only fields                               |
//! |----------------|-----------------|-------------------------------------------------|
//! | `booking`      | `created`       | guest profile, internal notes, hotel id         |
//! | `booking`      | `checked_in`    | same                                            |
//! | `booking`      | `checked_out`   | same                                            |
//! | `booking`      | `cancelled`     | same + cancellation reason                      |
//! | `booking`      | `room_moved`    | same + previous room                            |
//! | `chat`         | `message_sent`  | same + token id                                 |
//! | `room_service` | `order_placed`  | same + token id                                 |
//!
//! Guest projections carry only what the guest already has a right to see:
//! booking id and reference, status, stay timestamps, public hotel contact,
//! their current room, and their own messages and orders.

use crate::activity::{ChatMessageRecord, OrderLine, RoomServiceOrderRecord};
use crate::booking::{BookingSnapshot, BookingStatus, GuestProfile, HotelContact};
use crate::event::{Category, EnvelopeError, EventScope};
use crate::ids::{BookingId, HotelId, RoomNumber, TokenId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A committed (or about-to-commit) state change that subscribers hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum StayEvent {
    /// A booking was created.
    BookingCreated {
        /// Booking after creation.
        booking: BookingSnapshot,
    },
    /// The guest checked in.
    CheckedIn {
        /// Booking after check-in.
        booking: BookingSnapshot,
        /// Room assigned at check-in, if any.
        room: Option<RoomNumber>,
    },
    /// The guest checked out.
    CheckedOut {
        /// Booking after checkout.
        booking: BookingSnapshot,
    },
    /// The booking was cancelled.
    BookingCancelled {
        /// Booking after cancellation.
        booking: BookingSnapshot,
        /// Staff-entered reason.
        reason: Option<String>,
    },
    /// Staff moved the guest to another room.
    RoomMoved {
        /// Booking at move time.
        booking: BookingSnapshot,
        /// Room before the move.
        from: Option<RoomNumber>,
        /// Room after the move.
        to: RoomNumber,
    },
    /// The guest sent a chat message.
    ChatMessageSent {
        /// Booking at send time.
        booking: BookingSnapshot,
        /// Stored message.
        message: ChatMessageRecord,
    },
    /// The guest placed a room-service order.
    RoomServiceOrderPlaced {
        /// Booking at order time.
        booking: BookingSnapshot,
        /// Stored order.
        order: RoomServiceOrderRecord,
    },
}

impl StayEvent {
    /// Domain of the event.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::BookingCreated { .. }
            | Self::CheckedIn { .. }
            | Self::CheckedOut { .. }
            | Self::BookingCancelled { .. }
            | Self::RoomMoved { .. } => Category::Booking,
            Self::ChatMessageSent { .. } => Category::Chat,
            Self::RoomServiceOrderPlaced { .. } => Category::RoomService,
        }
    }

    /// Action name within the category.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::BookingCreated { .. } => "created",
            Self::CheckedIn { .. } => "checked_in",
            Self::CheckedOut { .. } => "checked_out",
            Self::BookingCancelled { .. } => "cancelled",
            Self::RoomMoved { .. } => "room_moved",
            Self::ChatMessageSent { .. } => "message_sent",
            Self::RoomServiceOrderPlaced { .. } => "order_placed",
        }
    }

    /// Booking the event concerns.
    #[must_use]
    pub const fn booking(&self) -> &BookingSnapshot {
        match self {
            Self::BookingCreated { booking }
            | Self::CheckedIn { booking, .. }
            | Self::CheckedOut { booking }
            | Self::BookingCancelled { booking, .. }
            | Self::RoomMoved { booking, .. }
            | Self::ChatMessageSent { booking, .. }
            | Self::RoomServiceOrderPlaced { booking, .. } => booking,
        }
    }

    /// Hotel and booking the event is confined to.
    #[must_use]
    pub fn scope(&self) -> EventScope {
        let booking = self.booking();
        EventScope {
            hotel: booking.hotel.clone(),
            booking: Some(booking.id),
        }
    }

    /// Full projection for hotel staff.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::SerializationError`] if the view cannot be encoded.
    pub fn staff_payload(&self) -> Result<serde_json::Value, EnvelopeError> {
        let booking = self.booking();
        let mut payload = StaffPayload {
            booking: StaffBookingView::from(booking),
            room: None,
            previous_room: None,
            reason: None,
            message: None,
            order: None,
        };

        match self {
            Self::BookingCreated { .. } | Self::CheckedOut { .. } => {}
            Self::CheckedIn { room, .. } => payload.room = room.as_ref(),
            Self::BookingCancelled { reason, .. } => payload.reason = reason.as_deref(),
            Self::RoomMoved { from, to, .. } => {
                payload.room = Some(to);
                payload.previous_room = from.as_ref();
            }
            Self::ChatMessageSent { message, .. } => {
                payload.room = Some(&message.room_snapshot);
                payload.message = Some(StaffChatView {
                    id: message.id,
                    body: &message.body,
                    token_id: message.token_id,
                    created_at: message.created_at,
                });
            }
            Self::RoomServiceOrderPlaced { order, .. } => {
                payload.room = Some(&order.room_snapshot);
                payload.order = Some(StaffOrderView {
                    id: order.id,
                    lines: &order.lines,
                    token_id: order.token_id,
                    created_at: order.created_at,
                });
            }
        }

        encode(&payload)
    }

    /// Redacted projection for the guest holding the booking.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::SerializationError`] if the view cannot be encoded.
    pub fn guest_payload(&self) -> Result<serde_json::Value, EnvelopeError> {
        let booking = self.booking();
        let mut payload = GuestPayload {
            booking: GuestBookingView::from(booking),
            room: None,
            message: None,
            order: None,
        };

        match self {
            Self::BookingCreated { .. }
            | Self::CheckedOut { .. }
            | Self::BookingCancelled { .. } => {}
            Self::CheckedIn { room, .. } => payload.room = room.as_ref(),
            Self::RoomMoved { to, .. } => payload.room = Some(to),
            Self::ChatMessageSent { message, .. } => {
                payload.room = Some(&message.room_snapshot);
                payload.message = Some(GuestChatView {
                    id: message.id,
                    body: &message.body,
                    created_at: message.created_at,
                });
            }
            Self::RoomServiceOrderPlaced { order, .. } => {
                payload.room = Some(&order.room_snapshot);
                payload.order = Some(GuestOrderView {
                    id: order.id,
                    lines: &order.lines,
                    created_at: order.created_at,
                });
            }
        }

        encode(&payload)
    }
}

fn encode<T: Serialize>(view: &T) -> Result<serde_json::Value, EnvelopeError> {
    serde_json::to_value(view).map_err(|e| EnvelopeError::SerializationError(e.to_string()))
}

#[derive(Serialize)]
struct StaffPayload<'a> {
    booking: StaffBookingView<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    room: Option<&'a RoomNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_room: Option<&'a RoomNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<StaffChatView<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<StaffOrderView<'a>>,
}

#[derive(Serialize)]
struct StaffBookingView<'a> {
    booking_id: BookingId,
    reference: &'a str,
    hotel: &'a HotelId,
    status: BookingStatus,
    guest: &'a GuestProfile,
    arrival: DateTime<Utc>,
    departure: DateTime<Utc>,
    checked_in_at: Option<DateTime<Utc>>,
    checked_out_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    internal_notes: Option<&'a str>,
}

impl<'a> From<&'a BookingSnapshot> for StaffBookingView<'a> {
    fn from(b: &'a BookingSnapshot) -> Self {
        Self {
            booking_id: b.id,
            reference: &b.reference,
            hotel: &b.hotel,
            status: b.status(),
            guest: &b.guest,
            arrival: b.arrival,
            departure: b.departure,
            checked_in_at: b.checked_in_at,
            checked_out_at: b.checked_out_at,
            cancelled_at: b.cancelled_at,
            internal_notes: b.internal_notes.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct StaffChatView<'a> {
    id: Uuid,
    body: &'a str,
    token_id: TokenId,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct StaffOrderView<'a> {
    id: Uuid,
    lines: &'a [OrderLine],
    token_id: TokenId,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct GuestPayload<'a> {
    booking: GuestBookingView<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    room: Option<&'a RoomNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<GuestChatView<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<GuestOrderView<'a>>,
}

#[derive(Serialize)]
struct GuestBookingView<'a> {
    booking_id: BookingId,
    reference: &'a str,
    status: BookingStatus,
    arrival: DateTime<Utc>,
    departure: DateTime<Utc>,
    checked_in_at: Option<DateTime<Utc>>,
    checked_out_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    hotel_contact: &'a HotelContact,
}

impl<'a> From<&'a BookingSnapshot> for GuestBookingView<'a> {
    fn from(b: &'a BookingSnapshot) -> Self {
        Self {
            booking_id: b.id,
            reference: &b.reference,
            status: b.status(),
            arrival: b.arrival,
            departure: b.departure,
            checked_in_at: b.checked_in_at,
            checked_out_at: b.checked_out_at,
            cancelled_at: b.cancelled_at,
            hotel_contact: &b.hotel_contact,
        }
    }
}

#[derive(Serialize)]
struct GuestChatView<'a> {
    id: Uuid,
    body: &'a str,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct GuestOrderView<'a> {
    id: Uuid,
    lines: &'a [OrderLine],
    created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const TOKEN: Uuid = Uuid::from_u128(0xfeed_beef);

    fn booking() -> BookingSnapshot {
        let arrival = DateTime::parse_from_rfc3339("2025-03-01T15:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        BookingSnapshot {
            id: BookingId(1042),
            reference: "GP-1042".to_string(),
            hotel: HotelId::new("grand-plaza").unwrap(),
            hotel_contact: HotelContact {
                name: "Grand Plaza".to_string(),
                phone: Some("+1 555 0100".to_string()),
                email: Some("desk@grandplaza.example".to_string()),
            },
            guest: GuestProfile {
                name: "Ada Lovelace".to_string(),
                email: Some("ada@example.com".to_string()),
                phone: Some("+44 20 0000".to_string()),
            },
            arrival,
            departure: arrival + Duration::days(3),
            checked_in_at: Some(arrival),
            checked_out_at: None,
            cancelled_at: None,
            internal_notes: Some("VIP, comp upgrade".to_string()),
        }
    }

    fn chat() -> StayEvent {
        let b = booking();
        StayEvent::ChatMessageSent {
            message: ChatMessageRecord {
                id: Uuid::from_u128(1),
                booking: b.id,
                hotel: b.hotel.clone(),
                body: "Extra towels please".to_string(),
                room_snapshot: RoomNumber::new("1204").unwrap(),
                token_id: TokenId(TOKEN),
                created_at: b.arrival,
            },
            booking: b,
        }
    }

    fn every_event() -> Vec<StayEvent> {
        let b = booking();
        let room = RoomNumber::new("1204").unwrap();
        vec![
            StayEvent::BookingCreated { booking: b.clone() },
            StayEvent::CheckedIn {
                booking: b.clone(),
                room: Some(room.clone()),
            },
            StayEvent::CheckedOut { booking: b.clone() },
            StayEvent::BookingCancelled {
                booking: b.clone(),
                reason: Some("card declined twice".to_string()),
            },
            StayEvent::RoomMoved {
                booking: b.clone(),
                from: Some(RoomNumber::new("0901").unwrap()),
                to: room.clone(),
            },
            chat(),
            StayEvent::RoomServiceOrderPlaced {
                order: RoomServiceOrderRecord {
                    id: Uuid::from_u128(2),
                    booking: b.id,
                    hotel: b.hotel.clone(),
                    lines: vec![OrderLine {
                        item: "Club sandwich".to_string(),
                        quantity: 1,
                        note: None,
                    }],
                    room_snapshot: room,
                    token_id: TokenId(TOKEN),
                    created_at: b.arrival,
                },
                booking: b,
            },
        ]
    }

    #[test]
    fn guest_projection_never_leaks_staff_fields() {
        for event in every_event() {
            let guest = event.guest_payload().unwrap().to_string();
            assert!(!guest.contains("ada@example.com"), "{}", event.event_type());
            assert!(!guest.contains("Ada Lovelace"), "{}", event.event_type());
            assert!(!guest.contains("VIP"), "{}", event.event_type());
            assert!(!guest.contains("card declined"), "{}", event.event_type());
            assert!(!guest.contains("0901"), "{}", event.event_type());
            assert!(!guest.contains(&TOKEN.to_string()), "{}", event.event_type());
            assert!(!guest.contains("token_id"), "{}", event.event_type());
        }
    }

    #[test]
    fn guest_projection_keeps_what_the_guest_may_see() {
        let guest = chat().guest_payload().unwrap();
        assert_eq!(guest["booking"]["booking_id"], 1042);
        assert_eq!(guest["booking"]["status"], "checked_in");
        assert_eq!(guest["booking"]["hotel_contact"]["phone"], "+1 555 0100");
        assert_eq!(guest["room"], "1204");
        assert_eq!(guest["message"]["body"], "Extra towels please");
    }

    #[test]
    fn staff_projection_is_complete() {
        let staff = chat().staff_payload().unwrap();
        assert_eq!(staff["booking"]["guest"]["email"], "ada@example.com");
        assert_eq!(staff["booking"]["internal_notes"], "VIP, comp upgrade");
        assert_eq!(staff["message"]["token_id"], TOKEN.to_string());
    }

    #[test]
    fn room_move_reports_both_rooms_to_staff_only() {
        let event = &every_event()[4];
        let staff = event.staff_payload().unwrap();
        assert_eq!(staff["previous_room"], "0901");
        assert_eq!(staff["room"], "1204");
        let guest = event.guest_payload().unwrap();
        assert!(guest.get("previous_room").is_none());
        assert_eq!(guest["room"], "1204");
    }

    #[test]
    fn names_and_scope_are_fixed_per_variant() {
        let pairs: Vec<_> = every_event()
            .iter()
            .map(|e| (e.category().as_str(), e.event_type()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("booking", "created"),
                ("booking", "checked_in"),
                ("booking", "checked_out"),
                ("booking", "cancelled"),
                ("booking", "room_moved"),
                ("chat", "message_sent"),
                ("room_service", "order_placed"),
            ]
        );
        assert_eq!(chat().scope().booking, Some(BookingId(1042)));
    }
}
