//! Mock staff session store for testing.

use crate::error::StoreError;
use crate::providers::{StaffSession, StaffSessionProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Mock staff session store.
///
/// Returns whatever was inserted. Expiry is left to the caller, which
/// checks it against its own clock.
#[derive(Debug, Clone, Default)]
pub struct MockStaffSessionStore {
    sessions: Arc<Mutex<HashMap<String, StaffSession>>>,
}

impl MockStaffSessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under `session_id`.
    pub fn insert(&self, session_id: impl Into<String>, session: StaffSession) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.into(), session);
    }

    /// Log a session out.
    pub fn remove(&self, session_id: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }
}

impl StaffSessionProvider for MockStaffSessionStore {
    async fn staff_session(&self, session_id: &str) -> Result<Option<StaffSession>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned())
    }
}
