//! Production store adapters.
//!
//! - **Staff sessions** (Redis): read-only lookup of sessions written by
//!   the staff login service.
//! - **Credentials, bookings, guest activity** (`PostgreSQL`, behind the
//!   `postgres` feature).

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod staff_session_redis;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresBookingDirectory, PostgresCredentialStore, PostgresGuestActivity};
pub use staff_session_redis::RedisStaffSessionStore;
