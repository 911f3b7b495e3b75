//! # Stayline Guest Access
//!
//! Guest access tokens, guest context resolution and realtime channel
//! authorization.
//!
//! ## Components
//!
//! - [`TokenLifecycleManager`]: issue, validate, revoke and touch guest tokens.
//! - [`GuestContextResolver`]: token → booking, live room, permissions.
//! - [`ChannelGateway`]: staff sessions and guest tokens → signed channel grants.
//! - [`StayHooks`]: what the reservations write paths call on stay transitions.
//! - [`GuestActionService`]: chat messages and room-service orders.
//!
//! Collaborators are reached through the traits in [`providers`]. In-memory
//! implementations live in `mocks` (feature `test-utils`, on by default);
//! Redis and `PostgreSQL` implementations live in [`stores`].
//!
//! ## Example: issue and resolve
//!
//! ```
//! use stayline_auth::mocks::{MockBookingDirectory, MockCredentialStore};
//! use stayline_auth::{AccessTier, GuestContextResolver, TokenLifecycleManager, TokenPolicy};
//! use stayline_testing::{BookingFixture, SequentialIdGenerator, test_clock};
//! use stayline_testing::fixtures::hotel;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), stayline_auth::AccessError> {
//! let directory = MockBookingDirectory::new();
//! let booking = BookingFixture::new(1042, "grand-plaza").build();
//! directory.insert(booking.clone());
//!
//! let tokens = TokenLifecycleManager::new(
//!     MockCredentialStore::new(),
//!     Arc::new(test_clock()),
//!     Arc::new(SequentialIdGenerator::new()),
//!     TokenPolicy::default(),
//! );
//! let issued = tokens.issue(booking.id, Some(booking.departure)).await?;
//!
//! let resolver = GuestContextResolver::new(tokens, directory);
//! let ctx = resolver
//!     .resolve(issued.raw.expose(), &hotel("grand-plaza"), AccessTier::ReadOnly)
//!     .await?;
//! assert!(!ctx.permissions.can_chat);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod actions;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod hooks;
pub mod lifecycle;
pub mod providers;
pub mod stores;
pub mod token;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use actions::GuestActionService;
pub use config::{GatewayConfig, TokenPolicy};
pub use context::{AccessTier, GuestContext, GuestContextResolver, GuestContextView, Permissions};
pub use error::{AccessError, InvalidReason, Result, StoreError};
pub use gateway::{ChannelGateway, ChannelGrant, Credential, GrantSigner, GrantSubject};
pub use hooks::StayHooks;
pub use lifecycle::TokenLifecycleManager;
pub use token::{
    GuestAccessToken, IssuedToken, RawToken, RevocationReason, TokenHash, TokenStatus,
    TokenSummary,
};
