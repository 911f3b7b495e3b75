//! # Stayline Testing
//!
//! Testing utilities for the Stayline workspace.
//!
//! This crate provides:
//! - Deterministic implementations of the environment traits ([`FixedClock`],
//!   [`ManualClock`], [`SequentialIdGenerator`])
//! - An [`InMemoryEventBus`] that records publishes and can simulate outages
//! - Booking fixtures
//!
//! ## Example
//!
//! ```
//! use stayline_testing::{ManualClock, test_clock};
//! use stayline_core::environment::Clock;
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_at(test_clock().now());
//! let before = clock.now();
//! clock.advance(Duration::days(31));
//! assert_eq!(clock.now() - before, Duration::days(31));
//! ```

pub mod event_bus;
pub mod fixtures;

use chrono::{DateTime, Utc};
use stayline_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use stayline_core::environment::IdGenerator;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use uuid::Uuid;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use stayline_testing::mocks::FixedClock;
    /// use stayline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can hand one clone to the
    /// services under test and advance another.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start the clock at `time`.
        #[must_use]
        pub fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward (or backward, with a negative duration).
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Predictable ids: `00000000-0000-0000-0000-000000000001`, `...002`, ...
    #[derive(Debug, Clone, Default)]
    pub struct SequentialIdGenerator {
        next: Arc<AtomicU64>,
    }

    impl SequentialIdGenerator {
        /// Start at 1.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_uuid(&self) -> Uuid {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            Uuid::from_u128(u128::from(n))
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(super::test_epoch())
    }
}

/// 2025-01-01 00:00:00 UTC, the reference instant for fixtures.
#[must_use]
pub fn test_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; output goes through the test harness writer so it is
/// only shown for failing tests.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use event_bus::InMemoryEventBus;
pub use fixtures::BookingFixture;
pub use mocks::{FixedClock, ManualClock, SequentialIdGenerator, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use stayline_core::environment::IdGenerator;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::starting_at(test_epoch());
        let handle = clock.clone();
        handle.advance(chrono::Duration::hours(2));
        assert_eq!(clock.now(), test_epoch() + chrono::Duration::hours(2));
    }

    #[test]
    fn sequential_ids_count_up_from_one() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_uuid().as_u128(), 1);
        assert_eq!(ids.next_uuid().as_u128(), 2);
    }
}
