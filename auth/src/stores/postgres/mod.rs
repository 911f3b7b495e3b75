//! `PostgreSQL` adapters.
//!
//! Queries are built at runtime with `sqlx::query` and `.bind`, so the crate
//! compiles without a database. The schema for the owned tables is in
//! `stayline-postgres`'s migrations.

mod activity;
mod booking;
mod credential;

pub use activity::PostgresGuestActivity;
pub use booking::PostgresBookingDirectory;
pub use credential::PostgresCredentialStore;

use crate::error::StoreError;

/// Map a `sqlx` error, keeping unique violations distinguishable.
fn classify(e: &sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Database(other.to_string()),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn db(e: sqlx::Error) -> StoreError {
    classify(&e)
}
