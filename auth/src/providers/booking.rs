//! Read-only access to the external booking aggregate.

use crate::error::StoreError;
use stayline_core::booking::BookingSnapshot;
use stayline_core::ids::{BookingId, RoomNumber};

/// Lookup of bookings owned by the reservations store.
pub trait BookingDirectory: Send + Sync {
    /// Current snapshot of a booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the lookup fails.
    fn booking(
        &self,
        id: BookingId,
    ) -> impl std::future::Future<Output = Result<Option<BookingSnapshot>, StoreError>> + Send;
}

/// The single authoritative source of "which room is this booking in now".
///
/// Read live on every resolution. Nothing in this crate caches the answer,
/// so a room move is visible on the very next call.
pub trait OccupancySource: Send + Sync {
    /// Room currently assigned to `booking`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the lookup fails.
    fn current_room(
        &self,
        booking: BookingId,
    ) -> impl std::future::Future<Output = Result<Option<RoomNumber>, StoreError>> + Send;
}
