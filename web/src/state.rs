//! Shared state for handlers.
//!
//! The router is generic over a [`Backend`]: the production server plugs in
//! the Postgres and Redis adapters, tests plug in the in-memory mocks.

use crate::relay::RelayHub;
use stayline_auth::providers::{
    BookingDirectory, CredentialStore, GuestActivityRepository, OccupancySource, StaffSessionProvider,
};
use stayline_auth::{ChannelGateway, GuestActionService, GuestContextResolver};

/// The set of store adapters a deployment runs with.
pub trait Backend: Send + Sync + 'static {
    /// Guest access token storage.
    type Credentials: CredentialStore + Clone + 'static;
    /// Bookings and live room occupancy.
    type Directory: BookingDirectory + OccupancySource + Clone + 'static;
    /// Staff session lookup.
    type Sessions: StaffSessionProvider + Clone + 'static;
    /// Chat and room-service persistence.
    type Activity: GuestActivityRepository + Clone + 'static;
}

/// Context resolver for backend `B`.
pub type ResolverFor<B> = GuestContextResolver<<B as Backend>::Credentials, <B as Backend>::Directory>;
/// Channel gateway for backend `B`.
pub type GatewayFor<B> =
    ChannelGateway<<B as Backend>::Credentials, <B as Backend>::Directory, <B as Backend>::Sessions>;
/// Guest action service for backend `B`.
pub type ActionsFor<B> =
    GuestActionService<<B as Backend>::Credentials, <B as Backend>::Directory, <B as Backend>::Activity>;

/// Application state shared across all HTTP handlers.
pub struct AppState<B: Backend> {
    /// Read-only guest access.
    pub resolver: ResolverFor<B>,
    /// Channel authorization.
    pub gateway: GatewayFor<B>,
    /// Chat and room service.
    pub actions: ActionsFor<B>,
    /// Realtime fan-out.
    pub relay: RelayHub,
}

impl<B: Backend> AppState<B> {
    /// Assemble the state.
    #[must_use]
    pub const fn new(
        resolver: ResolverFor<B>,
        gateway: GatewayFor<B>,
        actions: ActionsFor<B>,
        relay: RelayHub,
    ) -> Self {
        Self {
            resolver,
            gateway,
            actions,
            relay,
        }
    }
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            gateway: self.gateway.clone(),
            actions: self.actions.clone(),
            relay: self.relay.clone(),
        }
    }
}
