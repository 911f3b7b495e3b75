//! Staff session lookup.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stayline_core::ids::{HotelId, StaffId};

/// An authenticated staff member, as recorded by the staff login service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffSession {
    /// Staff member.
    pub staff_id: StaffId,
    /// Hotel the staff member works at.
    pub hotel: HotelId,
    /// Name shown in the console.
    pub display_name: String,
    /// Session expiry.
    pub expires_at: DateTime<Utc>,
}

/// Staff session lookup.
///
/// Sessions are created elsewhere; this core only reads them.
pub trait StaffSessionProvider: Send + Sync {
    /// Resolve a bearer session id.
    ///
    /// # Returns
    ///
    /// `None` if the session is unknown or expired.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the lookup fails.
    fn staff_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<StaffSession>, StoreError>> + Send;
}
