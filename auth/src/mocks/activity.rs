//! Mock guest activity repository for testing.

use crate::error::StoreError;
use crate::providers::GuestActivityRepository;
use stayline_core::activity::{ChatMessageRecord, RoomServiceOrderRecord};
use stayline_core::ids::BookingId;
use stayline_core::outbox::{Outbox, UnitOfWork};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct ActivityLog {
    messages: Vec<ChatMessageRecord>,
    orders: Vec<RoomServiceOrderRecord>,
}

/// Mock guest activity repository.
///
/// Writes are staged on a [`MemoryUnit`] and become visible only when the
/// unit commits.
#[derive(Debug, Clone, Default)]
pub struct MockGuestActivity {
    log: Arc<Mutex<ActivityLog>>,
    fail_next_commit: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MockGuestActivity {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next unit begun from this repository fail to commit.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make staged writes fail with [`StoreError::Database`].
    pub fn set_writes_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, ActivityLog> {
        lock_log(&self.log)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("activity insert failed".into()));
        }
        Ok(())
    }
}

fn lock_log(log: &Mutex<ActivityLog>) -> MutexGuard<'_, ActivityLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Unit of work over [`MockGuestActivity`].
#[derive(Debug)]
pub struct MemoryUnit {
    outbox: Outbox,
    messages: Vec<ChatMessageRecord>,
    orders: Vec<RoomServiceOrderRecord>,
    log: Arc<Mutex<ActivityLog>>,
    fail_commit: bool,
}

impl UnitOfWork for MemoryUnit {
    type Error = StoreError;

    fn outbox(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    async fn commit(self) -> Result<Outbox, Self::Error> {
        if self.fail_commit {
            return Err(StoreError::Database("commit failed".into()));
        }
        let mut log = lock_log(&self.log);
        log.messages.extend(self.messages);
        log.orders.extend(self.orders);
        Ok(self.outbox)
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl GuestActivityRepository for MockGuestActivity {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, StoreError> {
        Ok(MemoryUnit {
            outbox: Outbox::new(),
            messages: Vec::new(),
            orders: Vec::new(),
            log: Arc::clone(&self.log),
            fail_commit: self.fail_next_commit.swap(false, Ordering::SeqCst),
        })
    }

    async fn save_chat_message(
        &self,
        unit: &mut MemoryUnit,
        message: &ChatMessageRecord,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        unit.messages.push(message.clone());
        Ok(())
    }

    async fn save_room_service_order(
        &self,
        unit: &mut MemoryUnit,
        order: &RoomServiceOrderRecord,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        unit.orders.push(order.clone());
        Ok(())
    }

    async fn chat_messages(&self, booking: BookingId) -> Result<Vec<ChatMessageRecord>, StoreError> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| m.booking == booking)
            .cloned()
            .collect())
    }

    async fn room_service_orders(
        &self,
        booking: BookingId,
    ) -> Result<Vec<RoomServiceOrderRecord>, StoreError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|o| o.booking == booking)
            .cloned()
            .collect())
    }
}
