//! `PostgreSQL` support for Stayline.
//!
//! - [`PgUnitOfWork`]: a `sqlx` transaction paired with an [`Outbox`], so
//!   events queued during the transaction are released only by its commit.
//! - [`connect`] / [`migrate`]: pool construction and the embedded schema for
//!   the tables this workspace owns (`guest_access_tokens`,
//!   `guest_chat_messages`, `room_service_orders`).
//!
//! The `bookings`, `hotels` and `room_occupancies` tables belong to the
//! reservations store and are only read.
//!
//! # Example
//!
//! ```no_run
//! use stayline_postgres::{PgUnitOfWork, PoolConfig, connect, migrate};
//! use stayline_core::outbox::UnitOfWork;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect(&PoolConfig::new("postgres://localhost/stayline")).await?;
//! migrate(&pool).await?;
//!
//! let mut unit = PgUnitOfWork::begin(&pool).await?;
//! sqlx::query("SELECT 1").execute(unit.connection()).await?;
//! let outbox = unit.commit().await?;
//! assert!(outbox.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! [`Outbox`]: stayline_core::outbox::Outbox

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod pool;
pub mod unit_of_work;

pub use pool::{PoolConfig, connect, migrate};
pub use unit_of_work::PgUnitOfWork;

use thiserror::Error;

/// Errors from the `PostgreSQL` layer.
#[derive(Error, Debug)]
pub enum PostgresError {
    /// The pool could not connect.
    #[error("Failed to connect to PostgreSQL: {0}")]
    Connect(String),

    /// Embedded migrations failed.
    #[error("Migration failed: {0}")]
    Migrate(String),

    /// Begin, commit or rollback failed.
    #[error("Transaction error: {0}")]
    Transaction(String),
}
