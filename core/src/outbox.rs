//! Transactional outbox.
//!
//! Envelopes are never published at the moment a change is made. They are
//! queued in the [`Outbox`] owned by the active [`UnitOfWork`]; only a
//! successful [`UnitOfWork::commit`] hands the outbox back for publication.
//! Rolling back (or dropping) the unit of work drops the outbox with it, so a
//! rolled-back change can never be observed by a subscriber.
//!
//! Side effects that live outside the unit's store (a token revocation in
//! the credential store, say) ride along as follow-ups. They share the
//! envelopes' fate: run once the commit succeeds, before anything is
//! published, and dropped on rollback.
//!
//! ```text
//! begin ──► change ──► emit (queue) ──► commit ──► follow-ups ──► publish in order
//!                                   └─► rollback ──► discarded
//! ```

use crate::channel::Channel;
use crate::event::EventEnvelope;
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::future::Future;

/// Error returned by a failed follow-up.
pub type FollowUpError = Box<dyn std::error::Error + Send + Sync>;

/// A side effect deferred until its unit of work commits.
pub struct FollowUp {
    label: &'static str,
    action: BoxFuture<'static, Result<(), FollowUpError>>,
}

impl FollowUp {
    /// Short name used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Run the action.
    ///
    /// # Errors
    ///
    /// Returns whatever the action failed with.
    pub async fn run(self) -> Result<(), FollowUpError> {
        self.action.await
    }
}

impl std::fmt::Debug for FollowUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowUp")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// An envelope bound for a specific channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    /// Destination channel.
    pub channel: Channel,
    /// The envelope.
    pub envelope: EventEnvelope,
}

/// Ordered queue of envelopes waiting for their unit of work to commit.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<OutboundEvent>,
    follow_ups: Vec<FollowUp>,
}

impl Outbox {
    /// Create an empty outbox.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            follow_ups: Vec::new(),
        }
    }

    /// Queue an envelope. Order of calls is the order of publication.
    pub fn enqueue(&mut self, channel: Channel, envelope: EventEnvelope) {
        self.pending.push(OutboundEvent { channel, envelope });
    }

    /// Defer `action` until the unit of work commits.
    ///
    /// The future is not polled before then. Follow-ups run in the order
    /// they were added, ahead of publication.
    pub fn after_commit<F>(&mut self, label: &'static str, action: F)
    where
        F: Future<Output = Result<(), FollowUpError>> + Send + 'static,
    {
        self.follow_ups.push(FollowUp {
            label,
            action: Box::pin(action),
        });
    }

    /// Number of deferred follow-ups.
    #[must_use]
    pub fn follow_up_count(&self) -> usize {
        self.follow_ups.len()
    }

    /// Number of queued envelopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether neither envelopes nor follow-ups are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.follow_ups.is_empty()
    }

    /// Inspect queued envelopes without draining them.
    pub fn iter(&self) -> impl Iterator<Item = &OutboundEvent> {
        self.pending.iter()
    }

    /// Move everything queued in `other` onto the end of this outbox.
    pub fn absorb(&mut self, other: Self) {
        self.pending.extend(other.pending);
        self.follow_ups.extend(other.follow_ups);
    }

    /// Split into follow-ups and envelopes, each in queue order.
    #[must_use]
    pub fn into_parts(self) -> (Vec<FollowUp>, Vec<OutboundEvent>) {
        (self.follow_ups, self.pending)
    }
}

/// A transaction-like scope that owns an [`Outbox`].
///
/// Implementations bind the outbox to whatever makes the change durable: a
/// `sqlx` transaction in `stayline-postgres`, staged writes in the in-memory
/// adapters. The emission engine only ever talks to this trait.
pub trait UnitOfWork: Send {
    /// Error raised when the underlying change cannot be committed.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The outbox collecting envelopes for this unit of work.
    fn outbox(&mut self) -> &mut Outbox;

    /// Make the change durable and release the outbox for publication.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the commit fails; the outbox is dropped
    /// in that case, so nothing is published and no follow-up runs.
    fn commit(self) -> impl Future<Output = Result<Outbox, Self::Error>> + Send;

    /// Abandon the change. Queued envelopes and follow-ups are discarded.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the rollback itself fails.
    fn rollback(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A unit of work with no backing store.
///
/// Used when the state change already committed elsewhere (for example a
/// collaborator that reports a checkout after its own transaction) and only
/// the outbox discipline is needed.
#[derive(Debug, Default)]
pub struct DetachedUnit {
    outbox: Outbox,
}

impl DetachedUnit {
    /// Start an empty detached unit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outbox: Outbox::new(),
        }
    }
}

impl UnitOfWork for DetachedUnit {
    type Error = Infallible;

    fn outbox(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    async fn commit(self) -> Result<Outbox, Self::Error> {
        Ok(self.outbox)
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Audience;
    use crate::event::{Category, EventMeta, EventScope};
    use crate::ids::{BookingId, EventId, HotelId};
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    fn envelope(n: u128) -> EventEnvelope {
        EventEnvelope {
            category: Category::Chat,
            event_type: "message_sent".to_string(),
            payload: serde_json::json!({ "n": n }),
            meta: EventMeta {
                event_id: EventId(Uuid::from_u128(n)),
                ts: Utc::now(),
                scope: EventScope {
                    hotel: HotelId::new("h").unwrap(),
                    booking: Some(BookingId(1)),
                },
                correlation_id: Uuid::nil(),
                audience: Audience::Guest,
            },
        }
    }

    #[test]
    fn drains_in_queue_order() {
        let mut outbox = Outbox::new();
        for n in 1..=3 {
            outbox.enqueue(Channel::guest(BookingId(1)), envelope(n));
        }
        let (_, pending) = outbox.into_parts();
        let ids: Vec<_> = pending
            .into_iter()
            .map(|e| e.envelope.meta.event_id.0.as_u128())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn absorb_appends_after_existing_entries() {
        let mut first = Outbox::new();
        first.enqueue(Channel::guest(BookingId(1)), envelope(1));
        let mut second = Outbox::new();
        second.enqueue(Channel::guest(BookingId(1)), envelope(2));

        first.absorb(second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.iter().last().unwrap().envelope.meta.event_id.0.as_u128(), 2);
    }

    #[tokio::test]
    async fn follow_ups_wait_to_be_run() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut outbox = Outbox::new();
        let flag = Arc::clone(&ran);
        outbox.after_commit("flag", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        assert!(!outbox.is_empty());
        assert_eq!(outbox.len(), 0);
        assert!(!ran.load(Ordering::SeqCst));

        let (follow_ups, _) = outbox.into_parts();
        assert_eq!(follow_ups[0].label(), "flag");
        for follow_up in follow_ups {
            follow_up.run().await.unwrap();
        }
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rolled_back_unit_never_runs_its_follow_ups() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut unit = DetachedUnit::new();
        let flag = Arc::clone(&ran);
        unit.outbox().after_commit("flag", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        unit.rollback().await.unwrap();
        tokio::task::yield_now().await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn detached_unit_releases_outbox_on_commit() {
        let mut unit = DetachedUnit::new();
        unit.outbox().enqueue(Channel::guest(BookingId(1)), envelope(1));
        let outbox = unit.commit().await.unwrap();
        assert_eq!(outbox.len(), 1);
    }
}
