//! Read-only views of the external booking aggregate.
//!
//! Bookings are owned by the reservations store. These types are the narrow
//! snapshot this workspace needs to decide access and build payloads; nothing
//! here is written back.

use crate::ids::{BookingId, HotelId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle stage, derived from the booking's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Booked, not yet arrived.
    Confirmed,
    /// Checked in and not checked out.
    CheckedIn,
    /// Stay completed.
    CheckedOut,
    /// Cancelled before or during the stay.
    Cancelled,
}

/// Guest identity on the booking. Staff-only in every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestProfile {
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
}

/// Public contact details of the hotel. Safe for guests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelContact {
    /// Display name.
    pub name: String,
    /// Front desk phone.
    pub phone: Option<String>,
    /// Front desk email.
    pub email: Option<String>,
}

/// Point-in-time snapshot of a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSnapshot {
    /// Booking id.
    pub id: BookingId,
    /// Confirmation code shown to the guest.
    pub reference: String,
    /// Hotel the booking belongs to.
    pub hotel: HotelId,
    /// Public hotel contact.
    pub hotel_contact: HotelContact,
    /// Primary guest.
    pub guest: GuestProfile,
    /// Planned arrival.
    pub arrival: DateTime<Utc>,
    /// Planned departure (end of stay).
    pub departure: DateTime<Utc>,
    /// Actual check-in time.
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Actual checkout time.
    pub checked_out_at: Option<DateTime<Utc>>,
    /// Cancellation time.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Front-desk notes. Staff-only.
    pub internal_notes: Option<String>,
}

impl BookingSnapshot {
    /// Lifecycle stage. Cancellation wins over every other timestamp.
    #[must_use]
    pub const fn status(&self) -> BookingStatus {
        if self.cancelled_at.is_some() {
            BookingStatus::Cancelled
        } else if self.checked_out_at.is_some() {
            BookingStatus::CheckedOut
        } else if self.checked_in_at.is_some() {
            BookingStatus::CheckedIn
        } else {
            BookingStatus::Confirmed
        }
    }

    /// Checked in, not checked out, not cancelled.
    #[must_use]
    pub const fn is_in_house(&self) -> bool {
        self.checked_in_at.is_some() && self.checked_out_at.is_none() && self.cancelled_at.is_none()
    }
}
