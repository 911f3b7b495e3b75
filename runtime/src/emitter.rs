//! Event normalization and emission.
//!
//! [`EventEmitter`] is the only path by which a state change becomes a
//! realtime event. It is a plain service object built once per process from
//! its dependencies and shared by reference (usually inside an `Arc`).
//!
//! # Flow
//!
//! ```text
//! collaborator                EventEmitter                    EventBus
//!     │  emit(uow.outbox(), event)  │                            │
//!     ├────────────────────────────►│ staff + guest envelopes    │
//!     │                             │ queued, nothing published  │
//!     │  commit(uow)                │                            │
//!     ├────────────────────────────►│ uow.commit() ──► Outbox    │
//!     │                             │ run follow-ups in order    │
//!     │◄── DispatchHandle ──────────┤ spawn: publish in order ──►│
//!     │                             │ failures logged, absorbed  │
//! ```
//!
//! Follow-ups (token changes queued by the stay hooks) are awaited before
//! `commit` returns, so a guest who receives an event already sees the
//! token state it describes. The caller never waits on the broker. [`DispatchHandle::wait`] exists for
//! tests and shutdown paths that want to observe the outcome.

use crate::metrics::EmissionMetrics;
use stayline_core::channel::{Audience, Channel};
use stayline_core::environment::{Clock, IdGenerator};
use stayline_core::event::{EnvelopeError, EventEnvelope, EventMeta};
use stayline_core::event_bus::{EventBus, EventBusError};
use stayline_core::events::StayEvent;
use stayline_core::ids::EventId;
use stayline_core::outbox::{FollowUp, OutboundEvent, Outbox, UnitOfWork};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Emission engine configuration.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Upper bound on a single broker publish.
    pub publish_timeout: Duration,
}

impl EmitterConfig {
    /// Set the publish timeout.
    #[must_use]
    pub const fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(2),
        }
    }
}

/// Errors raised while queueing an event.
///
/// Publication errors never appear here; they are absorbed after commit.
#[derive(Error, Debug)]
pub enum EmitError {
    /// A payload projection could not be encoded.
    #[error("Failed to build event payload: {0}")]
    Payload(#[from] EnvelopeError),
}

/// Outcome of draining one committed outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Envelopes the broker accepted.
    pub published: usize,
    /// Envelopes that failed or timed out.
    pub failed: usize,
}

/// Handle to a background outbox drain.
///
/// Dropping the handle does not cancel the drain.
#[derive(Debug)]
pub struct DispatchHandle {
    task: Option<JoinHandle<DispatchReport>>,
    follow_ups_failed: usize,
}

impl DispatchHandle {
    /// A handle for an outbox that had nothing to publish.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            task: None,
            follow_ups_failed: 0,
        }
    }

    /// Follow-ups that failed after the commit. Each one was logged.
    #[must_use]
    pub const fn follow_ups_failed(&self) -> usize {
        self.follow_ups_failed
    }

    /// Wait for the drain to finish.
    pub async fn wait(self) -> DispatchReport {
        let Some(task) = self.task else {
            return DispatchReport::default();
        };
        match task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Outbox dispatch task did not complete");
                DispatchReport::default()
            }
        }
    }
}

/// The emission engine.
///
/// # Example
///
/// ```
/// use stayline_runtime::emitter::{EventEmitter, EmitterConfig};
/// use stayline_core::environment::{RandomIdGenerator, SystemClock};
/// use stayline_core::outbox::{DetachedUnit, UnitOfWork};
/// use stayline_testing::InMemoryEventBus;
/// use std::sync::Arc;
///
/// # async fn example(event: stayline_core::StayEvent) -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryEventBus::new();
/// let emitter = EventEmitter::new(
///     Arc::new(bus.clone()),
///     Arc::new(SystemClock),
///     Arc::new(RandomIdGenerator),
///     EmitterConfig::default(),
/// );
///
/// let mut unit = DetachedUnit::new();
/// emitter.emit(unit.outbox(), &event)?;
/// let report = emitter.commit(unit).await?.wait().await;
/// assert_eq!(report.published, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventEmitter {
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: EmitterConfig,
}

impl EventEmitter {
    /// Build the engine from its dependencies.
    #[must_use]
    pub fn new(
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: EmitterConfig,
    ) -> Self {
        Self {
            bus,
            clock,
            ids,
            config,
        }
    }

    /// Queue the staff and guest projections of `event` in `outbox`.
    ///
    /// Both envelopes share a fresh correlation id, which is returned.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Payload`] if a projection cannot be encoded. In
    /// that case nothing is queued.
    pub fn emit(&self, outbox: &mut Outbox, event: &StayEvent) -> Result<Uuid, EmitError> {
        let correlation_id = self.ids.next_uuid();
        self.emit_correlated(outbox, event, correlation_id)?;
        Ok(correlation_id)
    }

    /// Queue `event` under an existing correlation id (for example the
    /// request's `X-Correlation-ID`).
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Payload`] if a projection cannot be encoded.
    pub fn emit_correlated(
        &self,
        outbox: &mut Outbox,
        event: &StayEvent,
        correlation_id: Uuid,
    ) -> Result<(), EmitError> {
        // Build both before queueing either so a failure leaves the outbox untouched.
        let staff_payload = event.staff_payload()?;
        let guest_payload = event.guest_payload()?;

        let booking = event.booking();
        let staff_channel = Channel::staff(booking.hotel.clone(), event.category().staff_topic());
        let guest_channel = Channel::guest(booking.id);

        let staff = self.envelope(event, staff_payload, Audience::Staff, correlation_id);
        let guest = self.envelope(event, guest_payload, Audience::Guest, correlation_id);

        tracing::debug!(
            category = event.category().as_str(),
            event_type = event.event_type(),
            booking_id = %booking.id,
            staff_event_id = %staff.event_id(),
            guest_event_id = %guest.event_id(),
            %correlation_id,
            "Queued event projections"
        );

        outbox.enqueue(staff_channel, staff);
        outbox.enqueue(guest_channel, guest);
        EmissionMetrics::record_queued(2);
        Ok(())
    }

    /// Commit `unit`, run its follow-ups, then hand its envelopes to the
    /// broker in the background.
    ///
    /// # Errors
    ///
    /// Returns the unit's error if the commit fails; the queued envelopes
    /// and follow-ups are discarded.
    pub async fn commit<U: UnitOfWork>(&self, mut unit: U) -> Result<DispatchHandle, U::Error> {
        let queued = unit.outbox().len();
        match unit.commit().await {
            Ok(outbox) => Ok(self.release(outbox).await),
            Err(e) => {
                tracing::warn!(
                    queued,
                    error = %e,
                    "Unit of work failed to commit, discarding queued events"
                );
                EmissionMetrics::record_discarded(queued);
                Err(e)
            }
        }
    }

    /// Roll back `unit`, discarding everything it queued.
    ///
    /// # Errors
    ///
    /// Returns the unit's error if the rollback itself fails.
    pub async fn rollback<U: UnitOfWork>(&self, mut unit: U) -> Result<(), U::Error> {
        let queued = unit.outbox().len();
        let follow_ups = unit.outbox().follow_up_count();
        if queued > 0 || follow_ups > 0 {
            tracing::debug!(queued, follow_ups, "Rolling back, discarding queued events");
            EmissionMetrics::record_discarded(queued);
        }
        unit.rollback().await
    }

    /// Release an already-committed outbox: run its follow-ups, then
    /// publish its envelopes in the background.
    pub async fn release(&self, outbox: Outbox) -> DispatchHandle {
        let (follow_ups, pending) = outbox.into_parts();
        let follow_ups_failed = Self::run_follow_ups(follow_ups).await;
        if pending.is_empty() {
            return DispatchHandle {
                task: None,
                follow_ups_failed,
            };
        }
        let engine = self.clone();
        DispatchHandle {
            task: Some(tokio::spawn(async move { engine.publish_in_order(pending).await })),
            follow_ups_failed,
        }
    }

    async fn run_follow_ups(follow_ups: Vec<FollowUp>) -> usize {
        let mut failed = 0;
        for follow_up in follow_ups {
            let label = follow_up.label();
            match follow_up.run().await {
                Ok(()) => EmissionMetrics::record_follow_up("ok"),
                Err(e) => {
                    tracing::error!(follow_up = label, error = %e, "Post-commit follow-up failed");
                    EmissionMetrics::record_follow_up("failed");
                    failed += 1;
                }
            }
        }
        failed
    }

    async fn publish_in_order(&self, pending: Vec<OutboundEvent>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for OutboundEvent { channel, envelope } in pending {
            match self.publish_one(&channel, &envelope).await {
                Ok(()) => report.published += 1,
                Err(e) => {
                    tracing::error!(
                        channel = %channel,
                        event_id = %envelope.event_id(),
                        error = %e,
                        "Failed to publish event, dropping"
                    );
                    EmissionMetrics::record_publish_failed();
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn publish_one(
        &self,
        channel: &Channel,
        envelope: &EventEnvelope,
    ) -> Result<(), EventBusError> {
        let started = Instant::now();
        let timeout = self.config.publish_timeout;
        match tokio::time::timeout(timeout, self.bus.publish(channel, envelope)).await {
            Ok(Ok(())) => {
                EmissionMetrics::record_published(started.elapsed());
                tracing::trace!(channel = %channel, event_id = %envelope.event_id(), "Published event");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(EventBusError::Timeout {
                channel: channel.name(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn envelope(
        &self,
        event: &StayEvent,
        payload: serde_json::Value,
        audience: Audience,
        correlation_id: Uuid,
    ) -> EventEnvelope {
        EventEnvelope {
            category: event.category(),
            event_type: event.event_type().to_string(),
            payload,
            meta: EventMeta {
                event_id: EventId(self.ids.next_uuid()),
                ts: self.clock.now(),
                scope: event.scope(),
                correlation_id,
                audience,
            },
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
