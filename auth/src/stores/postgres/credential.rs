//! `PostgreSQL` credential store.

use super::db;
use crate::error::StoreError;
use crate::providers::CredentialStore;
use crate::token::{GuestAccessToken, RevocationReason, TokenHash, TokenStatus};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use stayline_core::ids::{BookingId, TokenId};
use uuid::Uuid;

const TOKEN_COLUMNS: &str = "id, booking_id, token_hash, status, created_at, expires_at, \
                             revoked_at, revoked_reason, last_used_at";

/// Credential store on the `guest_access_tokens` table.
///
/// The partial unique index `guest_access_tokens_one_active_per_booking`
/// enforces one active token per booking. A concurrent issuer that loses the
/// race gets [`StoreError::Conflict`] and its transaction is rolled back.
#[derive(Clone)]
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    /// Create a store on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_token(row: &PgRow) -> Result<GuestAccessToken, StoreError> {
        let status: String = row.try_get("status").map_err(db)?;
        let status = TokenStatus::parse(&status)
            .ok_or_else(|| StoreError::Database(format!("Invalid token status: {status}")))?;

        let reason: Option<String> = row.try_get("revoked_reason").map_err(db)?;
        let revoked_reason = match reason {
            Some(r) => Some(
                RevocationReason::parse(&r)
                    .ok_or_else(|| StoreError::Database(format!("Invalid revocation reason: {r}")))?,
            ),
            None => None,
        };

        Ok(GuestAccessToken {
            id: TokenId(row.try_get::<Uuid, _>("id").map_err(db)?),
            booking_id: BookingId(row.try_get("booking_id").map_err(db)?),
            token_hash: TokenHash::from_stored(row.try_get("token_hash").map_err(db)?),
            status,
            created_at: row.try_get("created_at").map_err(db)?,
            expires_at: row.try_get("expires_at").map_err(db)?,
            revoked_at: row.try_get("revoked_at").map_err(db)?,
            revoked_reason,
            last_used_at: row.try_get("last_used_at").map_err(db)?,
        })
    }
}

impl CredentialStore for PostgresCredentialStore {
    async fn replace_active(&self, token: &GuestAccessToken) -> Result<Option<TokenId>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let superseded: Option<(Uuid,)> = sqlx::query_as(
            r"
            UPDATE guest_access_tokens
            SET status = 'revoked', revoked_at = $2, revoked_reason = 'superseded'
            WHERE booking_id = $1 AND status = 'active'
            RETURNING id
            ",
        )
        .bind(token.booking_id.0)
        .bind(token.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO guest_access_tokens (
                id, booking_id, token_hash, status, created_at, expires_at
            ) VALUES ($1, $2, $3, 'active', $4, $5)
            ",
        )
        .bind(token.id.0)
        .bind(token.booking_id.0)
        .bind(token.token_hash.as_str())
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(superseded.map(|(id,)| TokenId(id)))
    }

    async fn find_by_hash(&self, hash: &TokenHash) -> Result<Option<GuestAccessToken>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM guest_access_tokens WHERE token_hash = $1"
        ))
        .bind(hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(Self::row_to_token).transpose()
    }

    async fn revoke_active(
        &self,
        booking_id: BookingId,
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) -> Result<Option<TokenId>, StoreError> {
        let revoked: Option<(Uuid,)> = sqlx::query_as(
            r"
            UPDATE guest_access_tokens
            SET status = 'revoked', revoked_at = $2, revoked_reason = $3
            WHERE booking_id = $1 AND status = 'active'
            RETURNING id
            ",
        )
        .bind(booking_id.0)
        .bind(at)
        .bind(reason.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(revoked.map(|(id,)| TokenId(id)))
    }

    async fn touch(&self, id: TokenId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE guest_access_tokens
            SET last_used_at = GREATEST(COALESCE(last_used_at, $2), $2)
            WHERE id = $1
            ",
        )
        .bind(id.0)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_for_booking(&self, booking_id: BookingId) -> Result<Vec<GuestAccessToken>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM guest_access_tokens \
             WHERE booking_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(booking_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(Self::row_to_token).collect()
    }
}
