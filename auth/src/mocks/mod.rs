//! In-memory provider implementations for testing.
//!
//! Each mock keeps its state behind `Arc<Mutex<_>>` so clones share it, and
//! exposes a few knobs (outages, forced conflicts) that tests use to reach
//! error paths.

pub mod activity;
pub mod booking;
pub mod credential_store;
pub mod staff_session;

pub use activity::{MemoryUnit, MockGuestActivity};
pub use booking::MockBookingDirectory;
pub use credential_store::MockCredentialStore;
pub use staff_session::MockStaffSessionStore;
