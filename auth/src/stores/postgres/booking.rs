//! `PostgreSQL` reads of the reservations store.

use super::db;
use crate::error::StoreError;
use crate::providers::{BookingDirectory, OccupancySource};
use sqlx::{PgPool, Row};
use stayline_core::booking::{BookingSnapshot, GuestProfile, HotelContact};
use stayline_core::ids::{BookingId, HotelId, RoomNumber};

/// Booking directory and occupancy source over the reservations tables.
///
/// "Current room" comes only from `room_occupancies` rows with
/// `ended_at IS NULL`; there is no room column on the booking.
#[derive(Clone)]
pub struct PostgresBookingDirectory {
    pool: PgPool,
}

impl PostgresBookingDirectory {
    /// Create a directory on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl BookingDirectory for PostgresBookingDirectory {
    async fn booking(&self, id: BookingId) -> Result<Option<BookingSnapshot>, StoreError> {
        let Some(row) = sqlx::query(
            r"
            SELECT b.id, b.reference, b.hotel_slug,
                   h.name AS hotel_name, h.phone AS hotel_phone, h.email AS hotel_email,
                   b.guest_name, b.guest_email, b.guest_phone,
                   b.arrival, b.departure, b.checked_in_at, b.checked_out_at, b.cancelled_at,
                   b.internal_notes
            FROM bookings b
            JOIN hotels h ON h.slug = b.hotel_slug
            WHERE b.id = $1
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        else {
            return Ok(None);
        };

        let slug: String = row.try_get("hotel_slug").map_err(db)?;
        let hotel = HotelId::new(slug).map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Some(BookingSnapshot {
            id: BookingId(row.try_get("id").map_err(db)?),
            reference: row.try_get("reference").map_err(db)?,
            hotel,
            hotel_contact: HotelContact {
                name: row.try_get("hotel_name").map_err(db)?,
                phone: row.try_get("hotel_phone").map_err(db)?,
                email: row.try_get("hotel_email").map_err(db)?,
            },
            guest: GuestProfile {
                name: row.try_get("guest_name").map_err(db)?,
                email: row.try_get("guest_email").map_err(db)?,
                phone: row.try_get("guest_phone").map_err(db)?,
            },
            arrival: row.try_get("arrival").map_err(db)?,
            departure: row.try_get("departure").map_err(db)?,
            checked_in_at: row.try_get("checked_in_at").map_err(db)?,
            checked_out_at: row.try_get("checked_out_at").map_err(db)?,
            cancelled_at: row.try_get("cancelled_at").map_err(db)?,
            internal_notes: row.try_get("internal_notes").map_err(db)?,
        }))
    }
}

impl OccupancySource for PostgresBookingDirectory {
    async fn current_room(&self, booking: BookingId) -> Result<Option<RoomNumber>, StoreError> {
        let room: Option<(String,)> = sqlx::query_as(
            r"
            SELECT room_number
            FROM room_occupancies
            WHERE booking_id = $1 AND ended_at IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            ",
        )
        .bind(booking.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        room.map(|(label,)| RoomNumber::new(label).map_err(|e| StoreError::Database(e.to_string())))
            .transpose()
    }
}
