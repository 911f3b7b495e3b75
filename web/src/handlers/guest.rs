//! Guest endpoints.
//!
//! ```text
//! GET  /api/v1/hotels/:hotel/guest/context
//! POST /api/v1/hotels/:hotel/guest/chat
//! POST /api/v1/hotels/:hotel/guest/orders
//! ```
//!
//! Every route reads the raw token from `X-Guest-Token`. A hotel slug that
//! does not parse is answered like an unknown token.

use crate::error::AppError;
use crate::extractors::{CorrelationId, GuestToken};
use crate::state::{AppState, Backend};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stayline_auth::{AccessTier, GuestContextView};
use stayline_core::activity::{ChatMessageRecord, OrderLine, RoomServiceOrderRecord};
use stayline_core::ids::{HotelId, RoomNumber};
use uuid::Uuid;

/// Body of `POST .../chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Message text.
    pub body: String,
}

/// Body of `POST .../orders`.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    /// Ordered lines.
    pub lines: Vec<OrderLine>,
}

/// A stored chat message as the guest sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageView {
    /// Message id.
    pub id: Uuid,
    /// Message text.
    pub body: String,
    /// Room at the time of sending.
    pub room: RoomNumber,
    /// When it was stored.
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessageRecord> for ChatMessageView {
    fn from(record: ChatMessageRecord) -> Self {
        Self {
            id: record.id,
            body: record.body,
            room: record.room_snapshot,
            created_at: record.created_at,
        }
    }
}

/// A stored room-service order as the guest sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    /// Order id.
    pub id: Uuid,
    /// Ordered lines.
    pub lines: Vec<OrderLine>,
    /// Delivery room.
    pub room: RoomNumber,
    /// When it was stored.
    pub created_at: DateTime<Utc>,
}

impl From<RoomServiceOrderRecord> for OrderView {
    fn from(record: RoomServiceOrderRecord) -> Self {
        Self {
            id: record.id,
            lines: record.lines,
            room: record.room_snapshot,
            created_at: record.created_at,
        }
    }
}

fn hotel_from_path(slug: &str) -> Result<HotelId, AppError> {
    HotelId::new(slug).map_err(|_| AppError::not_available())
}

/// `GET /api/v1/hotels/:hotel/guest/context`
///
/// # Errors
///
/// 404 for any token problem, 403 for another hotel, 500 on store failure.
pub async fn get_context<B: Backend>(
    State(state): State<AppState<B>>,
    Path(hotel): Path<String>,
    GuestToken(token): GuestToken,
) -> Result<Json<GuestContextView>, AppError> {
    let hotel = hotel_from_path(&hotel)?;
    let ctx = state
        .resolver
        .resolve(&token, &hotel, AccessTier::ReadOnly)
        .await
        .map_err(AppError::for_guest)?;
    Ok(Json(ctx.view()))
}

/// `POST /api/v1/hotels/:hotel/guest/chat`
///
/// # Errors
///
/// As [`get_context`], plus 409 before check-in or without a room and 422
/// for a rejected body.
pub async fn send_chat<B: Backend>(
    State(state): State<AppState<B>>,
    Path(hotel): Path<String>,
    GuestToken(token): GuestToken,
    CorrelationId(correlation_id): CorrelationId,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatMessageView>), AppError> {
    let hotel = hotel_from_path(&hotel)?;
    let Json(request) = body.map_err(|e| AppError::invalid_input(e.body_text()))?;
    let message = state
        .actions
        .send_chat_message(&token, &hotel, &request.body, Some(correlation_id))
        .await
        .map_err(AppError::for_guest)?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

/// `POST /api/v1/hotels/:hotel/guest/orders`
///
/// # Errors
///
/// As [`send_chat`].
pub async fn place_order<B: Backend>(
    State(state): State<AppState<B>>,
    Path(hotel): Path<String>,
    GuestToken(token): GuestToken,
    CorrelationId(correlation_id): CorrelationId,
    body: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), AppError> {
    let hotel = hotel_from_path(&hotel)?;
    let Json(request) = body.map_err(|e| AppError::invalid_input(e.body_text()))?;
    let order = state
        .actions
        .place_room_service_order(&token, &hotel, request.lines, Some(correlation_id))
        .await
        .map_err(AppError::for_guest)?;
    Ok((StatusCode::CREATED, Json(order.into())))
}
