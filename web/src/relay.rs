//! Realtime relay.
//!
//! One task per process reads the [`EventBus`], drops redeliveries by
//! `event_id`, and hands each envelope to the [`RelayHub`], which fans it out
//! to every websocket subscribed to its channel.
//!
//! ```text
//! EventBus ──► pump (Deduplicator) ──► RelayHub ──► channel A ──► sockets
//!                                               └─► channel B ──► sockets
//! ```

use stayline_core::dedup::Deduplicator;
use stayline_core::event::EventEnvelope;
use stayline_core::event_bus::{Delivery, EventBus};
use stayline_runtime::metrics::RelayMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

/// Envelopes buffered per channel before a slow socket starts lagging.
pub const CHANNEL_BUFFER: usize = 256;

type Channels = Arc<RwLock<HashMap<String, broadcast::Sender<Arc<EventEnvelope>>>>>;

/// Per-channel broadcast of envelopes to subscribed sockets.
#[derive(Clone, Default)]
pub struct RelayHub {
    channels: Channels,
}

impl RelayHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `envelope` to every socket subscribed to `channel`.
    ///
    /// Returns how many sockets received it. Channels nobody listens to are
    /// skipped without allocating.
    pub async fn publish(&self, channel: &str, envelope: Arc<EventEnvelope>) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .and_then(|sender| sender.send(envelope).ok())
            .unwrap_or(0)
    }

    /// Start receiving envelopes for `channel`.
    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<Arc<EventEnvelope>> {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_BUFFER).0)
            .subscribe()
    }

    /// Forget channels with no remaining subscribers.
    pub async fn prune(&self) {
        self.channels.write().await.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Number of channels with a sender.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl std::fmt::Debug for RelayHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayHub").finish_non_exhaustive()
    }
}

/// Read the bus into `hub` until the subscription ends.
///
/// The returned task ends when the bus stream does; the server treats that
/// as fatal for realtime delivery and logs it.
pub fn spawn_bus_pump(bus: Arc<dyn EventBus>, hub: RelayHub, dedup_capacity: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        use futures::StreamExt;

        let mut stream = match bus.subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Relay could not subscribe to the event bus");
                return;
            }
        };
        let mut dedup = Deduplicator::new(dedup_capacity);
        tracing::info!(dedup_capacity, "Realtime relay started");

        while let Some(next) = stream.next().await {
            match next {
                Ok(delivery) => relay_one(&hub, &mut dedup, delivery).await,
                Err(e) => {
                    RelayMetrics::record_delivery("undecodable");
                    tracing::warn!(error = %e, "Relay skipped a delivery");
                }
            }
        }
        tracing::warn!("Event bus stream ended, realtime relay stopped");
    })
}

async fn relay_one(hub: &RelayHub, dedup: &mut Deduplicator, delivery: Delivery) {
    let event_id = delivery.envelope.event_id();
    if !dedup.first_delivery(event_id) {
        RelayMetrics::record_delivery("duplicate");
        tracing::debug!(%event_id, "Dropping redelivered envelope");
        return;
    }
    RelayMetrics::record_delivery("forwarded");
    let channel = delivery.channel.name();
    let sockets = hub.publish(&channel, Arc::new(delivery.envelope)).await;
    tracing::trace!(%event_id, channel = %channel, sockets, "Relayed envelope");
}
