//! Identifier newtypes.
//!
//! Booking and hotel identifiers are owned by the external reservations store;
//! this crate only wraps them so they cannot be mixed up. Token, event and staff
//! identifiers are UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when constructing identifiers from untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Hotel slug is empty, too long, or contains characters outside `[a-z0-9-]`.
    #[error("Invalid hotel id: {0:?}")]
    InvalidHotelId(String),

    /// Booking id is not a positive integer in canonical form.
    #[error("Invalid booking id: {0:?}")]
    InvalidBookingId(String),

    /// Room number is empty or too long.
    #[error("Invalid room number: {0:?}")]
    InvalidRoomNumber(String),
}

/// Booking identifier from the reservations store.
///
/// Always positive. The canonical text form is the plain decimal number with
/// no sign and no leading zeros; [`FromStr`] rejects anything else so that a
/// booking id embedded in a channel name has exactly one spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub i64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookingId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = !s.is_empty()
            && s.bytes().all(|b| b.is_ascii_digit())
            && !s.starts_with('0');
        if !canonical {
            return Err(IdError::InvalidBookingId(s.to_string()));
        }
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| IdError::InvalidBookingId(s.to_string()))
    }
}

/// Hotel slug, e.g. `grand-plaza`.
///
/// Lowercase ASCII letters, digits and hyphens, 1 to 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HotelId(String);

impl HotelId {
    /// Maximum slug length.
    pub const MAX_LEN: usize = 64;

    /// Validate and wrap a hotel slug.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidHotelId`] if the slug is empty, longer than
    /// [`Self::MAX_LEN`], or contains characters outside `[a-z0-9-]`.
    pub fn new(slug: impl Into<String>) -> Result<Self, IdError> {
        let slug = slug.into();
        let valid = !slug.is_empty()
            && slug.len() <= Self::MAX_LEN
            && slug
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if valid {
            Ok(Self(slug))
        } else {
            Err(IdError::InvalidHotelId(slug))
        }
    }

    /// Borrow the slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HotelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HotelId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for HotelId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HotelId> for String {
    fn from(value: HotelId) -> Self {
        value.0
    }
}

/// Room label as printed on the door (`"1204"`, `"PH-2"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomNumber(String);

impl RoomNumber {
    /// Validate and wrap a room label (1 to 16 characters).
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidRoomNumber`] if the label is empty or too long.
    pub fn new(label: impl Into<String>) -> Result<Self, IdError> {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.len() > 16 {
            return Err(IdError::InvalidRoomNumber(label));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomNumber {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoomNumber> for String {
    fn from(value: RoomNumber) -> Self {
        value.0
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(
    /// Primary key of a guest access token row.
    TokenId
);
uuid_id!(
    /// Globally unique event identifier, used by consumers for deduplication.
    EventId
);
uuid_id!(
    /// Staff member identifier from the staff session store.
    StaffId
);
