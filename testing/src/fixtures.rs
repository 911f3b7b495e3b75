//! Booking fixtures.
//!
//! Fixtures panic on invalid input; they are only ever fed literals.

#![allow(clippy::expect_used)]

use crate::test_epoch;
use chrono::{DateTime, Duration, Utc};
use stayline_core::booking::{BookingSnapshot, GuestProfile, HotelContact};
use stayline_core::channel::Audience;
use stayline_core::event::{Category, EventEnvelope, EventMeta, EventScope};
use stayline_core::ids::{BookingId, EventId, HotelId, RoomNumber};
use uuid::Uuid;

/// Hotel id from a literal slug.
#[must_use]
pub fn hotel(slug: &str) -> HotelId {
    HotelId::new(slug).expect("fixture hotel slug must be valid")
}

/// Room number from a literal label.
#[must_use]
pub fn room(label: &str) -> RoomNumber {
    RoomNumber::new(label).expect("fixture room label must be valid")
}

/// Builder for [`BookingSnapshot`].
///
/// Defaults: a three-night stay arriving at [`test_epoch`], not checked in.
///
/// ```
/// use stayline_testing::BookingFixture;
/// use stayline_testing::test_epoch;
///
/// let booking = BookingFixture::new(1042, "grand-plaza")
///     .checked_in_at(test_epoch())
///     .build();
/// assert!(booking.is_in_house());
/// ```
#[derive(Debug, Clone)]
pub struct BookingFixture {
    snapshot: BookingSnapshot,
}

impl BookingFixture {
    /// Start a booking `id` at hotel `slug`.
    #[must_use]
    pub fn new(id: i64, slug: &str) -> Self {
        let arrival = test_epoch();
        Self {
            snapshot: BookingSnapshot {
                id: BookingId(id),
                reference: format!("SL-{id:06}"),
                hotel: hotel(slug),
                hotel_contact: HotelContact {
                    name: slug.replace('-', " "),
                    phone: Some("+1 555 0100".to_string()),
                    email: Some(format!("frontdesk@{slug}.example")),
                },
                guest: GuestProfile {
                    name: "Ada Lovelace".to_string(),
                    email: Some("ada@example.com".to_string()),
                    phone: Some("+44 20 7946 0000".to_string()),
                },
                arrival,
                departure: arrival + Duration::days(3),
                checked_in_at: None,
                checked_out_at: None,
                cancelled_at: None,
                internal_notes: Some("VIP, late checkout approved".to_string()),
            },
        }
    }

    /// Planned stay window.
    #[must_use]
    pub fn staying(mut self, arrival: DateTime<Utc>, departure: DateTime<Utc>) -> Self {
        self.snapshot.arrival = arrival;
        self.snapshot.departure = departure;
        self
    }

    /// Mark checked in.
    #[must_use]
    pub fn checked_in_at(mut self, at: DateTime<Utc>) -> Self {
        self.snapshot.checked_in_at = Some(at);
        self
    }

    /// Mark checked out.
    #[must_use]
    pub fn checked_out_at(mut self, at: DateTime<Utc>) -> Self {
        self.snapshot.checked_out_at = Some(at);
        self
    }

    /// Mark cancelled.
    #[must_use]
    pub fn cancelled_at(mut self, at: DateTime<Utc>) -> Self {
        self.snapshot.cancelled_at = Some(at);
        self
    }

    /// Replace the guest's name.
    #[must_use]
    pub fn guest_named(mut self, name: &str) -> Self {
        self.snapshot.guest.name = name.to_string();
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> BookingSnapshot {
        self.snapshot
    }
}

/// A minimal guest envelope for `booking` with event id `n`.
#[must_use]
pub fn envelope_for(booking: &BookingSnapshot, n: u128) -> EventEnvelope {
    EventEnvelope {
        category: Category::Booking,
        event_type: "checked_in".to_string(),
        payload: serde_json::json!({ "booking": { "id": booking.id } }),
        meta: EventMeta {
            event_id: EventId(Uuid::from_u128(n)),
            ts: test_epoch(),
            scope: EventScope {
                hotel: booking.hotel.clone(),
                booking: Some(booking.id),
            },
            correlation_id: Uuid::from_u128(n),
            audience: Audience::Guest,
        },
    }
}
