//! `PostgreSQL` guest activity repository.

use super::db;
use crate::error::StoreError;
use crate::providers::GuestActivityRepository;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use stayline_core::activity::{ChatMessageRecord, OrderLine, RoomServiceOrderRecord};
use stayline_core::ids::{BookingId, HotelId, RoomNumber, TokenId};
use stayline_postgres::PgUnitOfWork;
use uuid::Uuid;

/// Chat messages and room-service orders, written through [`PgUnitOfWork`].
#[derive(Clone)]
pub struct PostgresGuestActivity {
    pool: PgPool,
}

impl PostgresGuestActivity {
    /// Create a repository on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn hotel(row: &PgRow) -> Result<HotelId, StoreError> {
    let slug: String = row.try_get("hotel_slug").map_err(db)?;
    HotelId::new(slug).map_err(|e| StoreError::Database(e.to_string()))
}

fn room(row: &PgRow) -> Result<RoomNumber, StoreError> {
    let label: String = row.try_get("room_snapshot").map_err(db)?;
    RoomNumber::new(label).map_err(|e| StoreError::Database(e.to_string()))
}

fn row_to_message(row: &PgRow) -> Result<ChatMessageRecord, StoreError> {
    Ok(ChatMessageRecord {
        id: row.try_get("id").map_err(db)?,
        booking: BookingId(row.try_get("booking_id").map_err(db)?),
        hotel: hotel(row)?,
        body: row.try_get("body").map_err(db)?,
        room_snapshot: room(row)?,
        token_id: TokenId(row.try_get::<Uuid, _>("token_id").map_err(db)?),
        created_at: row.try_get("created_at").map_err(db)?,
    })
}

fn row_to_order(row: &PgRow) -> Result<RoomServiceOrderRecord, StoreError> {
    let Json(lines): Json<Vec<OrderLine>> = row.try_get("lines").map_err(db)?;
    Ok(RoomServiceOrderRecord {
        id: row.try_get("id").map_err(db)?,
        booking: BookingId(row.try_get("booking_id").map_err(db)?),
        hotel: hotel(row)?,
        lines,
        room_snapshot: room(row)?,
        token_id: TokenId(row.try_get::<Uuid, _>("token_id").map_err(db)?),
        created_at: row.try_get("created_at").map_err(db)?,
    })
}

impl GuestActivityRepository for PostgresGuestActivity {
    type Unit = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, StoreError> {
        PgUnitOfWork::begin(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn save_chat_message(
        &self,
        unit: &mut PgUnitOfWork,
        message: &ChatMessageRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO guest_chat_messages (
                id, booking_id, hotel_slug, body, room_snapshot, token_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(message.id)
        .bind(message.booking.0)
        .bind(message.hotel.as_str())
        .bind(&message.body)
        .bind(message.room_snapshot.as_str())
        .bind(message.token_id.0)
        .bind(message.created_at)
        .execute(unit.connection())
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn save_room_service_order(
        &self,
        unit: &mut PgUnitOfWork,
        order: &RoomServiceOrderRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO room_service_orders (
                id, booking_id, hotel_slug, lines, room_snapshot, token_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(order.id)
        .bind(order.booking.0)
        .bind(order.hotel.as_str())
        .bind(Json(&order.lines))
        .bind(order.room_snapshot.as_str())
        .bind(order.token_id.0)
        .bind(order.created_at)
        .execute(unit.connection())
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn chat_messages(&self, booking: BookingId) -> Result<Vec<ChatMessageRecord>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, booking_id, hotel_slug, body, room_snapshot, token_id, created_at
            FROM guest_chat_messages
            WHERE booking_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(booking.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(row_to_message).collect()
    }

    async fn room_service_orders(&self, booking: BookingId) -> Result<Vec<RoomServiceOrderRecord>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, booking_id, hotel_slug, lines, room_snapshot, token_id, created_at
            FROM room_service_orders
            WHERE booking_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(booking.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(row_to_order).collect()
    }
}
