//! Redis-backed staff session lookup.
//!
//! Sessions live under `staff_session:{id}` as JSON, written with a TTL by
//! the staff login service. This store never writes them.
//!
//! # Example
//!
//! ```no_run
//! use stayline_auth::stores::RedisStaffSessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisStaffSessionStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::StoreError;
use crate::providers::{StaffSession, StaffSessionProvider};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Longest session id looked up; anything longer is rejected without a round trip.
const MAX_SESSION_ID_LEN: usize = 128;

/// Redis staff session store.
#[derive(Clone)]
pub struct RedisStaffSessionStore {
    conn_manager: ConnectionManager,
}

impl RedisStaffSessionStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the client cannot connect.
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Database(format!("Failed to create Redis client: {e}")))?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Database(format!("Failed to create Redis connection manager: {e}"))
        })?;
        Ok(Self { conn_manager })
    }

    fn session_key(session_id: &str) -> String {
        format!("staff_session:{session_id}")
    }
}

impl StaffSessionProvider for RedisStaffSessionStore {
    async fn staff_session(&self, session_id: &str) -> Result<Option<StaffSession>, StoreError> {
        if session_id.is_empty() || session_id.len() > MAX_SESSION_ID_LEN {
            return Ok(None);
        }

        let mut conn = self.conn_manager.clone();
        let raw: Option<String> = conn
            .get(Self::session_key(session_id))
            .await
            .map_err(|e| StoreError::Database(format!("Failed to get staff session: {e}")))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let session: StaffSession = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable staff session record");
                return Ok(None);
            }
        };

        // TTL should have removed it already.
        if session.expires_at <= Utc::now() {
            tracing::warn!(
                staff_id = %session.staff_id,
                expires_at = %session.expires_at,
                "Staff session past expiry still present in Redis"
            );
            return Ok(None);
        }

        Ok(Some(session))
    }
}
