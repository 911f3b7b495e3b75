//! In-memory [`EventBus`] for tests and single-process deployments.
//!
//! Every successful publish is recorded and fanned out to subscribers over a
//! `tokio::sync::broadcast` channel. Tests can switch the bus off to simulate
//! a broker outage, add latency to exercise publish timeouts, and replay the
//! last delivery to exercise consumer deduplication.

use futures::Stream;
use stayline_core::channel::Channel;
use stayline_core::event::EventEnvelope;
use stayline_core::event_bus::{Delivery, DeliveryStream, EventBus, EventBusError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

const FANOUT_CAPACITY: usize = 1024;

struct Inner {
    published: Mutex<Vec<Delivery>>,
    attempts: AtomicUsize,
    available: AtomicBool,
    latency: Mutex<Option<Duration>>,
    fanout: broadcast::Sender<Delivery>,
}

/// Recording event bus.
///
/// Clones share state, so the emitter and the test can each hold one.
///
/// # Example
///
/// ```
/// use stayline_testing::InMemoryEventBus;
/// use stayline_core::EventBus;
///
/// let bus = InMemoryEventBus::new();
/// bus.set_available(false);
/// assert_eq!(bus.publish_attempts(), 0);
/// assert!(bus.published().is_empty());
/// ```
#[derive(Clone)]
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

impl InMemoryEventBus {
    /// Create an available bus with no latency.
    #[must_use]
    pub fn new() -> Self {
        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                published: Mutex::new(Vec::new()),
                attempts: AtomicUsize::new(0),
                available: AtomicBool::new(true),
                latency: Mutex::new(None),
                fanout,
            }),
        }
    }

    /// Simulate the broker going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Delay every publish by `latency` before it is accepted.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self
            .inner
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Every accepted delivery, in acceptance order.
    #[must_use]
    pub fn published(&self) -> Vec<Delivery> {
        self.inner
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Envelopes accepted for one channel, in acceptance order.
    #[must_use]
    pub fn published_to(&self, channel: &Channel) -> Vec<EventEnvelope> {
        self.published()
            .into_iter()
            .filter(|d| &d.channel == channel)
            .map(|d| d.envelope)
            .collect()
    }

    /// Number of publish calls, accepted or not.
    #[must_use]
    pub fn publish_attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Send the most recent delivery to subscribers again.
    ///
    /// Returns `false` if nothing has been published yet.
    pub fn redeliver_last(&self) -> bool {
        let last = self
            .inner
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned();
        match last {
            Some(delivery) => {
                let _ = self.inner.fanout.send(delivery);
                true
            }
            None => false,
        }
    }

    /// Forget recorded deliveries and attempts.
    pub fn clear(&self) {
        self.inner
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner.attempts.store(0, Ordering::SeqCst);
    }

    fn latency(&self) -> Option<Duration> {
        *self
            .inner
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("published", &self.published().len())
            .field("available", &self.inner.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        channel: &Channel,
        envelope: &EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let delivery = Delivery {
            channel: channel.clone(),
            envelope: envelope.clone(),
        };

        Box::pin(async move {
            self.inner.attempts.fetch_add(1, Ordering::SeqCst);

            if let Some(latency) = self.latency() {
                tokio::time::sleep(latency).await;
            }

            if !self.inner.available.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    channel: delivery.channel.name(),
                    reason: "broker unavailable".to_string(),
                });
            }

            self.inner
                .published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(delivery.clone());
            // No subscribers is not an error.
            let _ = self.inner.fanout.send(delivery);
            Ok(())
        })
    }

    fn subscribe(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryStream, EventBusError>> + Send + '_>> {
        let rx = self.inner.fanout.subscribe();
        Box::pin(async move { Ok(Box::pin(deliveries(rx)) as DeliveryStream) })
    }
}

fn deliveries(
    mut rx: broadcast::Receiver<Delivery>,
) -> impl Stream<Item = Result<Delivery, EventBusError>> + Send {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(delivery) => yield Ok(delivery),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    yield Err(EventBusError::SubscriptionFailed(format!(
                        "subscriber lagged, {skipped} deliveries dropped"
                    )));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
