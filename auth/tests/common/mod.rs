//! Shared wiring for the integration tests: every component built on the
//! in-memory mocks, one manual clock, one recording bus.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use stayline_auth::mocks::{
    MockBookingDirectory, MockCredentialStore, MockGuestActivity, MockStaffSessionStore,
};
use stayline_auth::providers::StaffSession;
use stayline_auth::{
    ChannelGateway, GatewayConfig, GrantSigner, GuestActionService, GuestContextResolver,
    StayHooks, TokenLifecycleManager, TokenPolicy,
};
use stayline_core::booking::BookingSnapshot;
use stayline_core::ids::StaffId;
use stayline_core::outbox::{DetachedUnit, UnitOfWork};
use stayline_runtime::{EmitterConfig, EventEmitter, RetryPolicy};
use stayline_testing::fixtures::hotel;
use stayline_testing::{BookingFixture, InMemoryEventBus, ManualClock, SequentialIdGenerator, test_epoch};
use std::sync::Arc;
use uuid::Uuid;

pub type Tokens = TokenLifecycleManager<MockCredentialStore>;
pub type Resolver = GuestContextResolver<MockCredentialStore, MockBookingDirectory>;
pub type Gateway = ChannelGateway<MockCredentialStore, MockBookingDirectory, MockStaffSessionStore>;
pub type Actions = GuestActionService<MockCredentialStore, MockBookingDirectory, MockGuestActivity>;

pub const HOTEL: &str = "grand-plaza";
pub const STAFF_SESSION: &str = "staff-session-1";

pub struct Harness {
    pub clock: ManualClock,
    pub bus: InMemoryEventBus,
    pub store: MockCredentialStore,
    pub directory: MockBookingDirectory,
    pub sessions: MockStaffSessionStore,
    pub activity: MockGuestActivity,
    pub emitter: EventEmitter,
    pub tokens: Tokens,
    pub resolver: Resolver,
    pub gateway: Gateway,
    pub hooks: StayHooks<MockCredentialStore>,
    pub actions: Actions,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::starting_at(test_epoch());
        let ids = Arc::new(SequentialIdGenerator::new());
        let bus = InMemoryEventBus::new();
        let store = MockCredentialStore::new();
        let directory = MockBookingDirectory::new();
        let sessions = MockStaffSessionStore::new();
        let activity = MockGuestActivity::new();

        let emitter = EventEmitter::new(
            Arc::new(bus.clone()),
            Arc::new(clock.clone()),
            ids.clone(),
            EmitterConfig::default(),
        );
        let tokens = TokenLifecycleManager::new(
            store.clone(),
            Arc::new(clock.clone()),
            ids.clone(),
            TokenPolicy::default(),
        )
        .with_retry_policy(
            RetryPolicy::default()
                .with_max_retries(20)
                .with_initial_delay(std::time::Duration::from_millis(1)),
        );
        let resolver = GuestContextResolver::new(tokens.clone(), directory.clone());
        let signer = GrantSigner::new(&GatewayConfig::new("test-key", b"test-secret".to_vec()));
        let gateway = ChannelGateway::new(resolver.clone(), sessions.clone(), signer);
        let hooks = StayHooks::new(tokens.clone(), emitter.clone());
        let actions = GuestActionService::new(resolver.clone(), activity.clone(), emitter.clone(), ids);

        sessions.insert(
            STAFF_SESSION,
            StaffSession {
                staff_id: StaffId(Uuid::from_u128(0xABCD)),
                hotel: hotel(HOTEL),
                display_name: "Front Desk".to_string(),
                expires_at: test_epoch() + Duration::hours(8),
            },
        );

        Self {
            clock,
            bus,
            store,
            directory,
            sessions,
            activity,
            emitter,
            tokens,
            resolver,
            gateway,
            hooks,
            actions,
        }
    }

    /// Create a booking through the hooks and return its raw token.
    pub async fn create_booking(&self, id: i64) -> (BookingSnapshot, String) {
        let booking = BookingFixture::new(id, HOTEL).build();
        self.directory.insert(booking.clone());

        let mut unit = DetachedUnit::new();
        let issued = self
            .hooks
            .booking_created(unit.outbox(), &booking)
            .expect("booking_created");
        self.emitter.commit(unit).await.unwrap().wait().await;

        (booking, issued.raw.expose().to_string())
    }

    /// Current snapshot from the directory.
    pub async fn booking(&self, id: i64) -> BookingSnapshot {
        use stayline_auth::providers::BookingDirectory;
        self.directory
            .booking(stayline_core::BookingId(id))
            .await
            .unwrap()
            .expect("booking exists")
    }
}
