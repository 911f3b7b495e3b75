//! # Stayline Runtime
//!
//! Runtime services shared by the Stayline crates.
//!
//! ## Core Components
//!
//! - **[`EventEmitter`]**: the emission engine. Builds audience projections,
//!   queues them in the active unit of work's outbox and publishes only after
//!   commit.
//! - **[`retry`]**: backoff loop used to absorb store conflicts on token issuance.
//! - **[`metrics`]**: Prometheus recorder and the counters every crate reports to.
//!
//! ## Example
//!
//! ```ignore
//! let emitter = EventEmitter::new(bus, clock, ids, EmitterConfig::default());
//!
//! let mut unit = store.begin().await?;
//! store.save(&mut unit, &record).await?;
//! emitter.emit(unit.outbox(), &event)?;
//! emitter.commit(unit).await?; // publication happens in the background
//! ```

/// Event normalization and transactional emission
pub mod emitter;

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

pub use emitter::{DispatchHandle, DispatchReport, EmitError, EmitterConfig, EventEmitter};
pub use retry::{RetryPolicy, retry_with_predicate};
