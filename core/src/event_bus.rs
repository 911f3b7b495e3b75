//! Event bus abstraction for realtime delivery.
//!
//! This module provides the [`EventBus`] trait: the broker client the emission
//! engine hands committed envelopes to, and the source the websocket relay
//! reads from.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Unit of work    │
//! │    commits       │◄─── Source of truth (external store)
//! └────────┬─────────┘
//!          │ drained outbox
//!          ▼
//! ┌──────────────────┐
//! │  EventBus        │◄─── At-least-once, bounded timeout,
//! │  .publish()      │     never retried at this layer
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Relay           │◄─── Dedups by event_id, fans out
//! │  .subscribe()    │     per channel
//! └──────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **Commit first**: nothing reaches the bus before its unit of work commits
//! - **At-least-once delivery**: the same envelope may arrive twice
//! - **Idempotency**: consumers drop repeated `event_id`s
//! - **No cross-channel ordering**: only the order within one drained outbox is kept
//!
//! # Implementations
//!
//! - `InMemoryEventBus` in `stayline-testing` - for tests and single-process setups
//! - `RedpandaEventBus` in `stayline-redpanda` - for production (Kafka-compatible)

use crate::channel::Channel;
use crate::event::EventEnvelope;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an envelope to a channel
    #[error("Publish failed for channel '{channel}': {reason}")]
    PublishFailed {
        /// The channel that failed
        channel: String,
        /// The reason for failure
        reason: String,
    },

    /// Publish did not complete within the configured bound
    #[error("Publish timed out for channel '{channel}' after {timeout_ms}ms")]
    Timeout {
        /// The channel that timed out
        channel: String,
        /// The bound that was exceeded
        timeout_ms: u64,
    },

    /// Failed to subscribe
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    /// Failed to encode an envelope
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to decode a delivery
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
}

/// One envelope as received from the bus, with the channel it was published to.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Destination channel.
    pub channel: Channel,
    /// The envelope.
    pub envelope: EventEnvelope,
}

/// Stream of deliveries from a subscription.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, EventBusError>> + Send>>;

/// Trait for broker clients.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// emission engine can hold an `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish an envelope to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] or [`EventBusError::Timeout`]
    /// if the broker does not accept the envelope. Callers in the emission
    /// path log and absorb these errors.
    fn publish(
        &self,
        channel: &Channel,
        envelope: &EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to every delivery on the bus.
    ///
    /// Channel filtering is the subscriber's job; the relay routes each
    /// [`Delivery`] to the sockets holding a grant for its channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryStream, EventBusError>> + Send + '_>>;
}
