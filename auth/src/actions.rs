//! Guest action service.
//!
//! Action-tier operations: the guest must be in house with a room. Each
//! created record snapshots the room assigned at that moment and the token
//! used, then the matching event is queued in the same unit of work and
//! published after commit.

use crate::context::{AccessTier, GuestContext, GuestContextResolver};
use crate::error::{AccessError, Result, StoreError};
use crate::providers::{BookingDirectory, CredentialStore, GuestActivityRepository, OccupancySource};
use stayline_core::activity::{ChatMessageRecord, OrderLine, RoomServiceOrderRecord};
use stayline_core::environment::IdGenerator;
use stayline_core::events::StayEvent;
use stayline_core::ids::{HotelId, RoomNumber};
use stayline_core::outbox::UnitOfWork;
use stayline_runtime::emitter::EventEmitter;
use std::sync::Arc;
use uuid::Uuid;

/// Longest chat message, in characters.
pub const MAX_CHAT_BODY_CHARS: usize = 2000;
/// Most lines in one order.
pub const MAX_ORDER_LINES: usize = 20;
/// Largest quantity on one line.
pub const MAX_LINE_QUANTITY: u32 = 99;
/// Longest item name or note, in characters.
pub const MAX_ORDER_TEXT_CHARS: usize = 500;

/// Creates chat messages and room-service orders for guests.
#[derive(Clone)]
pub struct GuestActionService<S, D, R> {
    resolver: GuestContextResolver<S, D>,
    activity: R,
    emitter: EventEmitter,
    ids: Arc<dyn IdGenerator>,
}

impl<S, D, R> GuestActionService<S, D, R>
where
    S: CredentialStore + Clone + 'static,
    D: BookingDirectory + OccupancySource,
    R: GuestActivityRepository,
{
    /// Create the service.
    #[must_use]
    pub fn new(
        resolver: GuestContextResolver<S, D>,
        activity: R,
        emitter: EventEmitter,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            resolver,
            activity,
            emitter,
            ids,
        }
    }

    /// The activity repository.
    #[must_use]
    pub const fn activity(&self) -> &R {
        &self.activity
    }

    /// Send a chat message to the front desk.
    ///
    /// # Errors
    ///
    /// - Any [`GuestContextResolver::resolve`] error at [`AccessTier::Action`].
    /// - [`AccessError::InvalidInput`] for an empty or oversized body.
    /// - [`AccessError::Store`] if the write or commit fails.
    pub async fn send_chat_message(
        &self,
        raw_token: &str,
        hotel: &HotelId,
        body: &str,
        correlation_id: Option<Uuid>,
    ) -> Result<ChatMessageRecord> {
        let ctx = self.resolver.resolve(raw_token, hotel, AccessTier::Action).await?;
        let body = validate_body(body)?;

        let message = ChatMessageRecord {
            id: self.ids.next_uuid(),
            booking: ctx.booking.id,
            hotel: ctx.booking.hotel.clone(),
            body,
            room_snapshot: room_of(&ctx)?,
            token_id: ctx.token_id,
            created_at: self.resolver.tokens().clock().now(),
        };

        let mut unit = self.activity.begin().await?;
        let staged = match self.activity.save_chat_message(&mut unit, &message).await {
            Ok(()) => self.queue(
                &mut unit,
                &StayEvent::ChatMessageSent {
                    booking: ctx.booking.clone(),
                    message: message.clone(),
                },
                correlation_id,
            ),
            Err(e) => Err(e.into()),
        };
        self.finish(unit, staged).await?;

        tracing::info!(
            booking_id = %message.booking,
            message_id = %message.id,
            room = %message.room_snapshot,
            "Guest chat message stored"
        );
        Ok(message)
    }

    /// Place a room-service order, delivered to the current room.
    ///
    /// # Errors
    ///
    /// - Any [`GuestContextResolver::resolve`] error at [`AccessTier::Action`].
    /// - [`AccessError::InvalidInput`] for an empty, oversized or malformed order.
    /// - [`AccessError::Store`] if the write or commit fails.
    pub async fn place_room_service_order(
        &self,
        raw_token: &str,
        hotel: &HotelId,
        lines: Vec<OrderLine>,
        correlation_id: Option<Uuid>,
    ) -> Result<RoomServiceOrderRecord> {
        let ctx = self.resolver.resolve(raw_token, hotel, AccessTier::Action).await?;
        let lines = validate_lines(lines)?;

        let order = RoomServiceOrderRecord {
            id: self.ids.next_uuid(),
            booking: ctx.booking.id,
            hotel: ctx.booking.hotel.clone(),
            lines,
            room_snapshot: room_of(&ctx)?,
            token_id: ctx.token_id,
            created_at: self.resolver.tokens().clock().now(),
        };

        let mut unit = self.activity.begin().await?;
        let staged = match self.activity.save_room_service_order(&mut unit, &order).await {
            Ok(()) => self.queue(
                &mut unit,
                &StayEvent::RoomServiceOrderPlaced {
                    booking: ctx.booking.clone(),
                    order: order.clone(),
                },
                correlation_id,
            ),
            Err(e) => Err(e.into()),
        };
        self.finish(unit, staged).await?;

        tracing::info!(
            booking_id = %order.booking,
            order_id = %order.id,
            room = %order.room_snapshot,
            lines = order.lines.len(),
            "Room service order stored"
        );
        Ok(order)
    }

    fn queue(&self, unit: &mut R::Unit, event: &StayEvent, correlation_id: Option<Uuid>) -> Result<()> {
        match correlation_id {
            Some(id) => self.emitter.emit_correlated(unit.outbox(), event, id)?,
            None => {
                self.emitter.emit(unit.outbox(), event)?;
            }
        }
        Ok(())
    }

    /// Commit if staging succeeded, otherwise roll back and return the staging error.
    async fn finish(&self, unit: R::Unit, staged: Result<()>) -> Result<()> {
        if let Err(e) = staged {
            if let Err(rollback) = self.emitter.rollback(unit).await {
                tracing::error!(error = %rollback, "Rollback failed after staging error");
            }
            return Err(e);
        }
        // Publication continues in the background; the caller does not wait on the broker.
        let _dispatch = self
            .emitter
            .commit(unit)
            .await
            .map_err(|e| AccessError::Store(StoreError::Database(e.to_string())))?;
        Ok(())
    }
}

impl<S, D, R> std::fmt::Debug for GuestActionService<S, D, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestActionService")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

fn room_of(ctx: &GuestContext) -> Result<RoomNumber> {
    ctx.room.clone().ok_or(AccessError::RoomNotAssigned)
}

fn validate_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AccessError::InvalidInput("message body is empty".to_string()));
    }
    if body.chars().count() > MAX_CHAT_BODY_CHARS {
        return Err(AccessError::InvalidInput(format!(
            "message body exceeds {MAX_CHAT_BODY_CHARS} characters"
        )));
    }
    Ok(body.to_string())
}

fn validate_lines(lines: Vec<OrderLine>) -> Result<Vec<OrderLine>> {
    if lines.is_empty() {
        return Err(AccessError::InvalidInput("order has no lines".to_string()));
    }
    if lines.len() > MAX_ORDER_LINES {
        return Err(AccessError::InvalidInput(format!(
            "order exceeds {MAX_ORDER_LINES} lines"
        )));
    }
    lines
        .into_iter()
        .map(|line| {
            let item = line.item.trim();
            if item.is_empty() || item.chars().count() > MAX_ORDER_TEXT_CHARS {
                return Err(AccessError::InvalidInput("invalid item name".to_string()));
            }
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                return Err(AccessError::InvalidInput(format!(
                    "quantity must be between 1 and {MAX_LINE_QUANTITY}"
                )));
            }
            let note = line.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
            if note.as_ref().is_some_and(|n| n.chars().count() > MAX_ORDER_TEXT_CHARS) {
                return Err(AccessError::InvalidInput("note is too long".to_string()));
            }
            Ok(OrderLine {
                item: item.to_string(),
                quantity: line.quantity,
                note,
            })
        })
        .collect()
}
