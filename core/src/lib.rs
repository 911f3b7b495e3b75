//! # Stayline Core
//!
//! Core types for booking-scoped realtime event delivery.
//!
//! This crate holds the vocabulary every other Stayline crate speaks:
//!
//! - **Identifiers**: [`ids::BookingId`], [`ids::HotelId`], [`ids::TokenId`], ...
//! - **Channels**: the closed, versioned naming contract in [`channel`]
//! - **Envelopes**: the normalized `{category, type, payload, meta}` unit in [`event`]
//! - **Event bus**: the broker abstraction in [`event_bus`]
//! - **Outbox**: the transactional queue in [`outbox`]
//! - **Stay events**: the closed set of typed event builders in [`events`]
//! - **Environment**: injected [`environment::Clock`] and [`environment::IdGenerator`]
//!
//! ## Delivery Flow
//!
//! ```text
//! ┌──────────────────┐
//! │  Collaborator    │  checkout, chat, order write-paths
//! └────────┬─────────┘
//!          │ StayEvent
//!          ▼
//! ┌──────────────────┐
//! │  Outbox (in UoW) │◄─── discarded on rollback
//! └────────┬─────────┘
//!          │ commit
//!          ▼
//! ┌──────────────────┐
//! │    EventBus      │◄─── at-least-once, unique event_id
//! └──────────────────┘
//! ```
//!
//! Nothing in this crate performs I/O. Implementations of [`event_bus::EventBus`]
//! and [`outbox::UnitOfWork`] live in the adapter crates.

pub mod activity;
pub mod booking;
pub mod channel;
pub mod dedup;
pub mod event;
pub mod event_bus;
pub mod events;
pub mod ids;
pub mod outbox;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub use channel::{Audience, Channel, StaffTopic};
pub use event::{Category, EventEnvelope, EventMeta, EventScope};
pub use event_bus::{Delivery, EventBus, EventBusError};
pub use events::StayEvent;
pub use ids::{BookingId, EventId, HotelId, RoomNumber, StaffId, TokenId};
pub use outbox::{OutboundEvent, Outbox, UnitOfWork};

/// Environment module - Dependency injection traits
///
/// All sources of non-determinism (time, identifiers) are abstracted behind
/// traits and handed to services at construction time, so tests can pin them.
pub mod environment {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use stayline_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of globally unique identifiers.
    ///
    /// Event ids, token ids and record ids all come from here.
    pub trait IdGenerator: Send + Sync {
        /// Produce a fresh identifier. Must never repeat within a deployment.
        fn next_uuid(&self) -> Uuid;
    }

    /// Random (v4) identifier generator.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RandomIdGenerator;

    impl IdGenerator for RandomIdGenerator {
        fn next_uuid(&self) -> Uuid {
            Uuid::new_v4()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{IdGenerator, RandomIdGenerator};

    #[test]
    fn random_ids_do_not_repeat() {
        let ids = RandomIdGenerator;
        let a = ids.next_uuid();
        let b = ids.next_uuid();
        assert_ne!(a, b);
    }
}
