//! Channel naming contract (version 1).
//!
//! Exactly two patterns exist and no other name is ever authorized:
//!
//! | Audience | Pattern                                  | Example                            |
//! |----------|------------------------------------------|------------------------------------|
//! | Staff    | `private-hotel-{hotel_slug}-{topic}`     | `private-hotel-grand-plaza-chat`   |
//! | Guest    | `private-guest-booking-{booking_id}`     | `private-guest-booking-1042`       |
//!
//! Staff topics are the closed set in [`StaffTopic`]. Topic names never contain
//! a hyphen, so the hotel slug is everything between the staff prefix and the
//! last hyphen.
//!
//! The two prefixes diverge at their ninth byte (`h` vs `g`), so no guest
//! channel name is a prefix of any staff channel name and vice versa.
//! [`overlaps_staff_namespace`] is the check the gateway runs against guest
//! credentials before looking at the token at all.

use crate::ids::{BookingId, HotelId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the naming contract implemented here.
pub const CHANNEL_CONTRACT_VERSION: u32 = 1;

/// Prefix shared by every hotel-wide staff channel.
pub const STAFF_CHANNEL_PREFIX: &str = "private-hotel-";

/// Prefix shared by every per-booking guest channel.
pub const GUEST_CHANNEL_PREFIX: &str = "private-guest-booking-";

/// Who a channel (and the payloads published on it) is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Hotel staff; receives full projections.
    Staff,
    /// The guest holding the booking; receives redacted projections.
    Guest,
}

/// Operational topics inside a hotel's staff namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffTopic {
    /// Booking lifecycle: created, check-in, checkout, cancellation, room moves.
    Bookings,
    /// Guest chat messages.
    Chat,
    /// Room-service orders.
    RoomService,
}

impl StaffTopic {
    /// Every staff topic, in a stable order.
    pub const ALL: [Self; 3] = [Self::Bookings, Self::Chat, Self::RoomService];

    /// Wire name used inside the channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bookings => "bookings",
            Self::Chat => "chat",
            Self::RoomService => "room_service",
        }
    }

    /// Look up a topic by wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

/// A channel in the closed naming contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Hotel-wide operational channel.
    Staff {
        /// Hotel the channel belongs to.
        hotel: HotelId,
        /// Operational topic.
        topic: StaffTopic,
    },
    /// Private channel of a single booking.
    Guest {
        /// Booking the channel is derived from.
        booking: BookingId,
    },
}

impl Channel {
    /// Staff channel for `hotel` and `topic`.
    #[must_use]
    pub const fn staff(hotel: HotelId, topic: StaffTopic) -> Self {
        Self::Staff { hotel, topic }
    }

    /// The one guest channel derived from `booking`.
    #[must_use]
    pub const fn guest(booking: BookingId) -> Self {
        Self::Guest { booking }
    }

    /// Audience of this channel.
    #[must_use]
    pub const fn audience(&self) -> Audience {
        match self {
            Self::Staff { .. } => Audience::Staff,
            Self::Guest { .. } => Audience::Guest,
        }
    }

    /// Parse a channel name.
    ///
    /// Returns `None` for anything outside the two patterns, including
    /// non-canonical spellings (`private-guest-booking-007`).
    ///
    /// # Examples
    ///
    /// ```
    /// use stayline_core::channel::{Channel, StaffTopic};
    /// use stayline_core::ids::{BookingId, HotelId};
    ///
    /// let staff = Channel::parse("private-hotel-grand-plaza-room_service").unwrap();
    /// assert_eq!(
    ///     staff,
    ///     Channel::staff(HotelId::new("grand-plaza").unwrap(), StaffTopic::RoomService)
    /// );
    ///
    /// assert_eq!(
    ///     Channel::parse("private-guest-booking-1042"),
    ///     Some(Channel::guest(BookingId(1042)))
    /// );
    /// assert!(Channel::parse("presence-hotel-grand-plaza-chat").is_none());
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(rest) = name.strip_prefix(GUEST_CHANNEL_PREFIX) {
            return rest.parse::<BookingId>().ok().map(Self::guest);
        }

        let rest = name.strip_prefix(STAFF_CHANNEL_PREFIX)?;
        let (hotel, topic) = rest.rsplit_once('-')?;
        let topic = StaffTopic::from_wire(topic)?;
        let hotel = HotelId::new(hotel).ok()?;
        Some(Self::staff(hotel, topic))
    }

    /// Wire name of this channel.
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staff { hotel, topic } => {
                write!(f, "{STAFF_CHANNEL_PREFIX}{hotel}-{}", topic.as_str())
            }
            Self::Guest { booking } => write!(f, "{GUEST_CHANNEL_PREFIX}{booking}"),
        }
    }
}

/// Whether `name` shares any prefix relationship with the staff namespace.
///
/// True when `name` starts with the staff prefix (so it could be, or be
/// extended into, a staff channel) or when `name` is itself a prefix of the
/// staff prefix (so it could match staff traffic under prefix subscription).
/// Guest credentials are refused for all such names unconditionally.
#[must_use]
pub fn overlaps_staff_namespace(name: &str) -> bool {
    name.starts_with(STAFF_CHANNEL_PREFIX) || STAFF_CHANNEL_PREFIX.starts_with(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hotel(slug: &str) -> HotelId {
        HotelId::new(slug).unwrap()
    }

    #[test]
    fn staff_channel_round_trips_through_its_name() {
        for topic in StaffTopic::ALL {
            let channel = Channel::staff(hotel("grand-plaza"), topic);
            assert_eq!(Channel::parse(&channel.name()), Some(channel));
        }
    }

    #[test]
    fn hyphenated_hotel_slug_is_split_at_last_hyphen() {
        let parsed = Channel::parse("private-hotel-a-b-c-bookings").unwrap();
        assert_eq!(parsed, Channel::staff(hotel("a-b-c"), StaffTopic::Bookings));
    }

    #[test]
    fn unknown_topics_and_patterns_are_rejected() {
        assert!(Channel::parse("private-hotel-grand-plaza-payroll").is_none());
        assert!(Channel::parse("private-hotel-grand-plaza").is_none());
        assert!(Channel::parse("private-hotel--chat").is_none());
        assert!(Channel::parse("private-guest-booking-").is_none());
        assert!(Channel::parse("private-guest-booking-12a").is_none());
        assert!(Channel::parse("private-guest-booking-0012").is_none());
        assert!(Channel::parse("public-lobby").is_none());
    }

    #[test]
    fn staff_namespace_overlap_covers_both_prefix_directions() {
        assert!(overlaps_staff_namespace("private-hotel-grand-plaza-chat"));
        assert!(overlaps_staff_namespace("private-hotel-"));
        assert!(overlaps_staff_namespace("private-hotel-grand"));
        assert!(overlaps_staff_namespace("private-hot"));
        assert!(overlaps_staff_namespace("private-"));
        assert!(overlaps_staff_namespace(""));
        assert!(!overlaps_staff_namespace("private-guest-booking-7"));
    }

    #[test]
    fn guest_channels_are_outside_the_staff_namespace() {
        assert_eq!(Channel::guest(BookingId(7)).audience(), Audience::Guest);
        assert!(!overlaps_staff_namespace(&Channel::guest(BookingId(7)).name()));
    }

    proptest! {
        #[test]
        fn guest_and_staff_names_never_prefix_each_other(
            booking in 1i64..i64::MAX,
            slug in "[a-z0-9][a-z0-9-]{0,30}",
            topic_index in 0usize..3,
        ) {
            let guest = Channel::guest(BookingId(booking)).name();
            let staff = Channel::staff(hotel(&slug), StaffTopic::ALL[topic_index]).name();

            prop_assert!(!staff.starts_with(&guest));
            prop_assert!(!guest.starts_with(&staff));
            prop_assert!(!overlaps_staff_namespace(&guest));
            prop_assert!(overlaps_staff_namespace(&staff));
        }

        #[test]
        fn parse_never_accepts_what_it_cannot_print(name in "\\PC{0,48}") {
            if let Some(channel) = Channel::parse(&name) {
                prop_assert_eq!(channel.name(), name);
            }
        }
    }
}
