//! Guest activity repository trait.

use crate::error::StoreError;
use stayline_core::activity::{ChatMessageRecord, RoomServiceOrderRecord};
use stayline_core::ids::BookingId;
use stayline_core::outbox::UnitOfWork;

/// Storage for records created by guest actions.
///
/// Writes happen inside a unit of work so the matching realtime event can be
/// queued in the same outbox and published only if the write commits.
pub trait GuestActivityRepository: Send + Sync {
    /// Unit of work type the repository writes through.
    type Unit: UnitOfWork;

    /// Start a unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no transaction can be opened.
    fn begin(&self) -> impl std::future::Future<Output = Result<Self::Unit, StoreError>> + Send;

    /// Stage a chat message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    fn save_chat_message(
        &self,
        unit: &mut Self::Unit,
        message: &ChatMessageRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Stage a room-service order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    fn save_room_service_order(
        &self,
        unit: &mut Self::Unit,
        order: &RoomServiceOrderRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Committed chat messages for a booking, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn chat_messages(
        &self,
        booking: BookingId,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessageRecord>, StoreError>> + Send;

    /// Committed room-service orders for a booking, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn room_service_orders(
        &self,
        booking: BookingId,
    ) -> impl std::future::Future<Output = Result<Vec<RoomServiceOrderRecord>, StoreError>> + Send;
}
