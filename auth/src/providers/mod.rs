//! Collaborator interfaces.
//!
//! Everything the guest access core reads or writes outside itself goes
//! through one of these traits. Production adapters live in
//! [`crate::stores`]; in-memory versions live in `crate::mocks`.
//!
//! ```text
//!                ┌─────────────────────┐
//!                │ TokenLifecycleMgr   │──► CredentialStore   (owned: tokens)
//!                └──────────┬──────────┘
//!                           │
//!                ┌──────────▼──────────┐
//!                │ GuestContextResolver│──► BookingDirectory  (external, read)
//!                └──────────┬──────────┘──► OccupancySource   (external, read, live)
//!                           │
//!        ┌──────────────────┼──────────────────┐
//!        ▼                  ▼                  ▼
//!  ChannelGateway    GuestActionService    StayHooks
//!        │                  │
//!        ▼                  ▼
//!  StaffSessionProvider  GuestActivityRepository (owned: chat, orders)
//! ```

pub mod activity;
pub mod booking;
pub mod credential_store;
pub mod staff_session;

pub use activity::GuestActivityRepository;
pub use booking::{BookingDirectory, OccupancySource};
pub use credential_store::CredentialStore;
pub use staff_session::{StaffSession, StaffSessionProvider};
