//! Redpanda event bus for Stayline.
//!
//! Implements [`EventBus`] from `stayline-core` on top of rdkafka, so any
//! Kafka-compatible broker works (Redpanda, Apache Kafka, MSK).
//!
//! # Wire format
//!
//! Every channel shares one topic. Each record carries:
//!
//! - **key**: the channel name (`private-hotel-grand-plaza-chat`,
//!   `private-guest-booking-1042`). Records for one channel land on one
//!   partition, so per-channel order is kept by the broker.
//! - **payload**: the envelope as JSON, exactly as the relay forwards it to
//!   websocket clients.
//!
//! ```text
//! ┌──────────────┐  key = channel name   ┌──────────────────┐
//! │ EventEmitter │ ────────────────────► │ stayline-realtime│
//! └──────────────┘  payload = envelope   └────────┬─────────┘
//!                                                 │ one consumer group
//!                                                 ▼ per relay instance
//!                                        ┌──────────────────┐
//!                                        │  websocket relay │
//!                                        └──────────────────┘
//! ```
//!
//! # Delivery semantics
//!
//! - Publishing is bounded by a timeout and never retried here; the
//!   emission engine logs and absorbs failures.
//! - Consumption is at-least-once with offsets committed after a delivery
//!   has been handed to the subscriber. Subscribers drop repeated
//!   `event_id`s.
//! - Each relay instance needs every record, so unless a group is
//!   configured, each subscription gets its own consumer group.
//!
//! # Example
//!
//! ```no_run
//! use stayline_redpanda::RedpandaEventBus;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .topic("stayline-realtime")
//!     .timeout(Duration::from_secs(2))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use stayline_core::channel::Channel;
use stayline_core::event::EventEnvelope;
use stayline_core::event_bus::{Delivery, DeliveryStream, EventBus, EventBusError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default topic for realtime envelopes.
pub const DEFAULT_TOPIC: &str = "stayline-realtime";

/// Redpanda-backed [`EventBus`].
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    topic: String,
    timeout: Duration,
    consumer_group: Option<String>,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Create a bus with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be
    /// created (invalid broker list or client configuration).
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Bootstrap servers.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Topic every channel is published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl std::fmt::Debug for RedpandaEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaEventBus")
            .field("brokers", &self.brokers)
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .field("consumer_group", &self.consumer_group)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RedpandaEventBus`].
///
/// ```no_run
/// use stayline_redpanda::RedpandaEventBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .compression("lz4")
///     .consumer_group("relay-eu-1")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Comma-separated bootstrap servers.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Topic for all channels.
    ///
    /// Default: [`DEFAULT_TOPIC`]
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Producer acknowledgment mode: `"0"`, `"1"` or `"all"`.
    ///
    /// Default: `"1"`
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Compression codec: `"none"`, `"gzip"`, `"snappy"`, `"lz4"`, `"zstd"`.
    ///
    /// Default: `"none"`
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Upper bound on one publish, including broker acknowledgment.
    ///
    /// Default: 2 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Consumer group for subscriptions.
    ///
    /// Instances sharing a group split the records between them, which is
    /// only wanted when something other than the relay consumes. When
    /// unset, every subscription gets a fresh group and sees every record.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Deliveries buffered between the consumer and the subscriber.
    ///
    /// Default: 1000. Zero is treated as one.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Where a new consumer group starts: `"earliest"` or `"latest"`.
    ///
    /// Default: `"latest"`
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the bus.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set or
    /// the producer cannot be created.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(2));
        let acks = self.producer_acks.as_deref().unwrap_or("1");
        let compression = self.compression.as_deref().unwrap_or("none");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("compression.type", compression)
            .create()
            .map_err(|e| EventBusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        let topic = self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let buffer_size = self.buffer_size.unwrap_or(1000);
        let auto_offset_reset = self.auto_offset_reset.unwrap_or_else(|| "latest".to_string());

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            acks,
            compression,
            timeout_ms = timeout.as_millis(),
            buffer_size,
            auto_offset_reset = %auto_offset_reset,
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            topic,
            timeout,
            consumer_group: self.consumer_group,
            buffer_size,
            auto_offset_reset,
        })
    }
}

/// Encode an envelope as a record payload.
///
/// # Errors
///
/// Returns [`EventBusError::SerializationFailed`] if JSON encoding fails.
pub fn encode_envelope(envelope: &EventEnvelope) -> Result<Vec<u8>, EventBusError> {
    serde_json::to_vec(envelope).map_err(|e| EventBusError::SerializationFailed(e.to_string()))
}

/// Decode a record back into a [`Delivery`].
///
/// # Errors
///
/// Returns [`EventBusError::DeserializationFailed`] if the key is missing
/// or is not a channel name, or if the payload is not an envelope.
pub fn decode_delivery(key: Option<&[u8]>, payload: Option<&[u8]>) -> Result<Delivery, EventBusError> {
    let key = key
        .ok_or_else(|| EventBusError::DeserializationFailed("Record has no key".to_string()))?;
    let name = std::str::from_utf8(key)
        .map_err(|e| EventBusError::DeserializationFailed(format!("Key is not UTF-8: {e}")))?;
    let channel = Channel::parse(name)
        .ok_or_else(|| EventBusError::DeserializationFailed(format!("Unknown channel '{name}'")))?;
    let payload = payload
        .ok_or_else(|| EventBusError::DeserializationFailed("Record has no payload".to_string()))?;
    let envelope = serde_json::from_slice::<EventEnvelope>(payload)
        .map_err(|e| EventBusError::DeserializationFailed(format!("Invalid envelope: {e}")))?;
    Ok(Delivery { channel, envelope })
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        channel: &Channel,
        envelope: &EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let channel = channel.name();
        let encoded = encode_envelope(envelope);
        let event_id = envelope.event_id();

        Box::pin(async move {
            let payload = encoded?;
            let record = FutureRecord::to(&self.topic).payload(&payload).key(channel.as_str());

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        channel = %channel,
                        %event_id,
                        partition,
                        offset,
                        "Envelope published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    let timed_out = matches!(
                        kafka_error.rdkafka_error_code(),
                        Some(rdkafka::types::RDKafkaErrorCode::MessageTimedOut)
                    );
                    if timed_out {
                        return Err(EventBusError::Timeout {
                            channel,
                            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                        });
                    }
                    Err(EventBusError::PublishFailed {
                        channel,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(&self) -> Pin<Box<dyn Future<Output = Result<DeliveryStream, EventBusError>> + Send + '_>> {
        let brokers = self.brokers.clone();
        let topic = self.topic.clone();
        let group = self
            .consumer_group
            .clone()
            .unwrap_or_else(|| format!("stayline-relay-{}", uuid::Uuid::new_v4()));
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &group)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed(format!("Failed to create consumer: {e}")))?;

            consumer
                .subscribe(&[topic.as_str()])
                .map_err(|e| EventBusError::SubscriptionFailed(format!("Failed to subscribe to '{topic}': {e}")))?;

            tracing::info!(
                topic = %topic,
                consumer_group = %group,
                buffer_size,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to realtime topic"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();
                while let Some(received) = stream.next().await {
                    let message = match received {
                        Ok(message) => message,
                        Err(e) => {
                            let err = EventBusError::SubscriptionFailed(format!("Failed to receive record: {e}"));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                            continue;
                        }
                    };

                    let delivery = decode_delivery(message.key(), message.payload());
                    if let Err(e) = &delivery {
                        tracing::warn!(
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Skipping undecodable record"
                        );
                    }

                    // Commit only after the subscriber has the delivery.
                    if tx.send(delivery).await.is_err() {
                        tracing::debug!("Subscriber dropped, stopping consumer");
                        break;
                    }
                    if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                        tracing::warn!(
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Failed to commit offset, record may be redelivered"
                        );
                    }
                }
                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as DeliveryStream)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use stayline_core::ids::BookingId;
    use stayline_testing::BookingFixture;
    use stayline_testing::fixtures::envelope_for;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let err = RedpandaEventBus::builder().build().unwrap_err();
        assert!(matches!(err, EventBusError::ConnectionFailed(_)));
    }

    #[test]
    fn record_decodes_to_channel_and_envelope() {
        let envelope = envelope_for(&BookingFixture::new(1042, "grand-plaza").build(), 7);
        let payload = encode_envelope(&envelope).unwrap();

        let delivery = decode_delivery(Some(b"private-guest-booking-1042"), Some(&payload)).unwrap();

        assert_eq!(delivery.channel, Channel::guest(BookingId(1042)));
        assert_eq!(delivery.envelope, envelope);
    }

    #[test]
    fn record_outside_the_naming_contract_is_rejected() {
        let envelope = envelope_for(&BookingFixture::new(1, "grand-plaza").build(), 1);
        let payload = encode_envelope(&envelope).unwrap();

        for key in [None, Some(&b"presence-lobby"[..]), Some(&b"private-guest-booking-01"[..])] {
            let err = decode_delivery(key, Some(&payload)).unwrap_err();
            assert!(matches!(err, EventBusError::DeserializationFailed(_)));
        }
        let err = decode_delivery(Some(b"private-guest-booking-1"), Some(b"{not json")).unwrap_err();
        assert!(matches!(err, EventBusError::DeserializationFailed(_)));
    }
}
