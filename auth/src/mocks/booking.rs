//! Mock booking directory and occupancy source for testing.

use crate::error::StoreError;
use crate::providers::{BookingDirectory, OccupancySource};
use chrono::{DateTime, Utc};
use stayline_core::booking::BookingSnapshot;
use stayline_core::ids::{BookingId, RoomNumber};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Directory {
    bookings: HashMap<BookingId, BookingSnapshot>,
    rooms: HashMap<BookingId, RoomNumber>,
}

/// Mock reservations store.
///
/// Plays both external collaborators: the booking directory and the live
/// room occupancy relation. Tests mutate it between calls to simulate
/// check-in, room moves and checkout happening elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MockBookingDirectory {
    inner: Arc<Mutex<Directory>>,
    unavailable: Arc<AtomicBool>,
}

impl MockBookingDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every lookup fail with [`StoreError::Database`].
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Insert or replace a booking.
    pub fn insert(&self, booking: BookingSnapshot) {
        self.lock().bookings.insert(booking.id, booking);
    }

    /// Remove a booking entirely.
    pub fn remove(&self, id: BookingId) {
        let mut dir = self.lock();
        dir.bookings.remove(&id);
        dir.rooms.remove(&id);
    }

    /// Assign (or move to) `room`.
    pub fn assign_room(&self, id: BookingId, room: RoomNumber) {
        self.lock().rooms.insert(id, room);
    }

    /// End the current occupancy without a new one.
    pub fn clear_room(&self, id: BookingId) {
        self.lock().rooms.remove(&id);
    }

    /// Mark the booking checked in at `at`.
    pub fn check_in(&self, id: BookingId, at: DateTime<Utc>) {
        if let Some(b) = self.lock().bookings.get_mut(&id) {
            b.checked_in_at = Some(at);
        }
    }

    /// Mark the booking checked out at `at` and end its occupancy.
    pub fn check_out(&self, id: BookingId, at: DateTime<Utc>) {
        let mut dir = self.lock();
        if let Some(b) = dir.bookings.get_mut(&id) {
            b.checked_out_at = Some(at);
        }
        dir.rooms.remove(&id);
    }

    /// Mark the booking cancelled at `at` and end its occupancy.
    pub fn cancel(&self, id: BookingId, at: DateTime<Utc>) {
        let mut dir = self.lock();
        if let Some(b) = dir.bookings.get_mut(&id) {
            b.cancelled_at = Some(at);
        }
        dir.rooms.remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, Directory> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("reservations store unavailable".into()));
        }
        Ok(())
    }
}

impl BookingDirectory for MockBookingDirectory {
    async fn booking(&self, id: BookingId) -> Result<Option<BookingSnapshot>, StoreError> {
        self.check_available()?;
        Ok(self.lock().bookings.get(&id).cloned())
    }
}

impl OccupancySource for MockBookingDirectory {
    async fn current_room(&self, booking: BookingId) -> Result<Option<RoomNumber>, StoreError> {
        self.check_available()?;
        Ok(self.lock().rooms.get(&booking).cloned())
    }
}
