//! Unit of work over a `sqlx` transaction.

use crate::PostgresError;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use stayline_core::outbox::{Outbox, UnitOfWork};

/// A database transaction with its outbox.
///
/// Writes go through [`PgUnitOfWork::connection`]; events go into
/// [`UnitOfWork::outbox`]. Dropping the unit without committing rolls the
/// transaction back and discards the outbox.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    outbox: Outbox,
}

impl PgUnitOfWork {
    /// Open a transaction on `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Transaction`] if no connection is available.
    pub async fn begin(pool: &PgPool) -> Result<Self, PostgresError> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| PostgresError::Transaction(format!("begin: {e}")))?;
        Ok(Self {
            tx,
            outbox: Outbox::new(),
        })
    }

    /// Connection to execute statements on inside the transaction.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }
}

impl std::fmt::Debug for PgUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgUnitOfWork")
            .field("queued", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl UnitOfWork for PgUnitOfWork {
    type Error = PostgresError;

    fn outbox(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    async fn commit(self) -> Result<Outbox, Self::Error> {
        let queued = self.outbox.len();
        self.tx.commit().await.map_err(|e| {
            metrics::counter!("stayline_unit_of_work_total", "outcome" => "commit_failed").increment(1);
            PostgresError::Transaction(format!("commit: {e}"))
        })?;
        metrics::counter!("stayline_unit_of_work_total", "outcome" => "committed").increment(1);
        tracing::debug!(queued, "Transaction committed");
        Ok(self.outbox)
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        metrics::counter!("stayline_unit_of_work_total", "outcome" => "rolled_back").increment(1);
        self.tx
            .rollback()
            .await
            .map_err(|e| PostgresError::Transaction(format!("rollback: {e}")))
    }
}
