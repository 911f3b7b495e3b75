//! End-to-end tests of the router over the in-memory backend.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use chrono::Duration;
use serde_json::{Value, json};
use stayline_auth::mocks::{
    MockBookingDirectory, MockCredentialStore, MockGuestActivity, MockStaffSessionStore,
};
use stayline_auth::providers::StaffSession;
use stayline_auth::{
    ChannelGateway, GatewayConfig, GrantSigner, GuestActionService, GuestContextResolver,
    TokenLifecycleManager, TokenPolicy,
};
use stayline_core::channel::StaffTopic;
use stayline_core::ids::{BookingId, StaffId};
use stayline_runtime::{EmitterConfig, EventEmitter};
use stayline_testing::fixtures::{hotel, room};
use stayline_testing::{BookingFixture, InMemoryEventBus, ManualClock, SequentialIdGenerator, test_epoch};
use stayline_web::{AppState, Backend, CORRELATION_ID_HEADER, GUEST_TOKEN_HEADER, RelayHub, router};
use std::sync::Arc;
use uuid::Uuid;

const HOTEL: &str = "grand-plaza";
const STAFF_SESSION: &str = "staff-session-1";

struct MockBackend;

impl Backend for MockBackend {
    type Credentials = MockCredentialStore;
    type Directory = MockBookingDirectory;
    type Sessions = MockStaffSessionStore;
    type Activity = MockGuestActivity;
}

struct App {
    server: TestServer,
    bus: InMemoryEventBus,
    directory: MockBookingDirectory,
    tokens: TokenLifecycleManager<MockCredentialStore>,
}

impl App {
    fn new() -> Self {
        let clock = ManualClock::starting_at(test_epoch());
        let ids = Arc::new(SequentialIdGenerator::new());
        let bus = InMemoryEventBus::new();
        let directory = MockBookingDirectory::new();
        let sessions = MockStaffSessionStore::new();
        sessions.insert(
            STAFF_SESSION,
            StaffSession {
                staff_id: StaffId(Uuid::from_u128(7)),
                hotel: hotel(HOTEL),
                display_name: "Front Desk".to_string(),
                expires_at: test_epoch() + Duration::hours(8),
            },
        );

        let emitter = EventEmitter::new(
            Arc::new(bus.clone()),
            Arc::new(clock.clone()),
            ids.clone(),
            EmitterConfig::default(),
        );
        let tokens = TokenLifecycleManager::new(
            MockCredentialStore::new(),
            Arc::new(clock),
            ids.clone(),
            TokenPolicy::default(),
        );
        let resolver = GuestContextResolver::new(tokens.clone(), directory.clone());
        let signer = GrantSigner::new(&GatewayConfig::new("test-key", b"test-secret".to_vec()));
        let gateway = ChannelGateway::new(resolver.clone(), sessions, signer);
        let actions = GuestActionService::new(resolver.clone(), MockGuestActivity::new(), emitter, ids);

        let state = AppState::<MockBackend>::new(resolver, gateway, actions, RelayHub::new());
        let server = TestServer::new(router(state)).expect("test server");

        Self {
            server,
            bus,
            directory,
            tokens,
        }
    }

    async fn booking(&self, id: i64, in_house_room: Option<&str>) -> String {
        let mut fixture = BookingFixture::new(id, HOTEL);
        if in_house_room.is_some() {
            fixture = fixture.checked_in_at(test_epoch());
        }
        let booking = fixture.build();
        self.directory.insert(booking.clone());
        if let Some(label) = in_house_room {
            self.directory.assign_room(booking.id, room(label));
        }
        let issued = self.tokens.issue(booking.id, Some(booking.departure)).await.unwrap();
        issued.raw.expose().to_string()
    }
}

fn guest_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-guest-token"),
        HeaderValue::from_str(token).unwrap(),
    )
}

fn context_path(hotel: &str) -> String {
    format!("/api/v1/hotels/{hotel}/guest/context")
}

#[tokio::test]
async fn health_is_ok() {
    let app = App::new();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[test]
fn guest_token_header_name_is_case_insensitive() {
    assert_eq!(
        HeaderName::from_static("x-guest-token"),
        HeaderName::from_bytes(GUEST_TOKEN_HEADER.as_bytes()).unwrap()
    );
}

#[tokio::test]
async fn context_is_returned_without_internal_fields() {
    let app = App::new();
    let token = app.booking(1042, None).await;
    let (name, value) = guest_header(&token);

    let response = app.server.get(&context_path(HOTEL)).add_header(name, value).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["channel"], "private-guest-booking-1042");
    assert_eq!(body["permissions"]["can_chat"], false);
    assert!(body["room"].is_null());
    let text = body.to_string();
    assert!(!text.contains("internal_notes"));
    assert!(!text.contains("VIP"));
    assert!(!text.contains("token_hash"));
}

#[tokio::test]
async fn token_problems_all_look_the_same() {
    let app = App::new();
    let token = app.booking(1, None).await;
    app.tokens
        .revoke(BookingId(1), stayline_auth::RevocationReason::CheckedOut)
        .await
        .unwrap();

    let missing = app.server.get(&context_path(HOTEL)).await;
    let (name, value) = guest_header("nonsense");
    let garbage = app.server.get(&context_path(HOTEL)).add_header(name, value).await;
    let (name, value) = guest_header(&token);
    let revoked = app.server.get(&context_path(HOTEL)).add_header(name, value).await;
    let (name, value) = guest_header(&token);
    let bad_slug = app.server.get(&context_path("Not_A_Slug")).add_header(name, value).await;

    for response in [missing, garbage, revoked, bad_slug] {
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "code": "NOT_FOUND", "message": "Not available" }));
    }
}

#[tokio::test]
async fn other_hotel_is_forbidden() {
    let app = App::new();
    let token = app.booking(5, None).await;
    let (name, value) = guest_header(&token);

    let response = app.server.get(&context_path("seaside-inn")).add_header(name, value).await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "HOTEL_MISMATCH");
}

#[tokio::test]
async fn chat_before_check_in_is_a_conflict() {
    let app = App::new();
    let token = app.booking(6, None).await;
    let (name, value) = guest_header(&token);

    let response = app
        .server
        .post(&format!("/api/v1/hotels/{HOTEL}/guest/chat"))
        .add_header(name, value)
        .json(&json!({ "body": "Extra towels please" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_IN_HOUSE");
    assert!(app.bus.published().is_empty());
}

#[tokio::test]
async fn chat_in_house_is_created_with_the_room() {
    let app = App::new();
    let token = app.booking(7, Some("412")).await;
    let (name, value) = guest_header(&token);
    let correlation = Uuid::from_u128(99);

    let response = app
        .server
        .post(&format!("/api/v1/hotels/{HOTEL}/guest/chat"))
        .add_header(name, value)
        .add_header(
            HeaderName::from_bytes(CORRELATION_ID_HEADER.as_bytes()).unwrap(),
            HeaderValue::from_str(&correlation.to_string()).unwrap(),
        )
        .json(&json!({ "body": "  Extra towels please  " }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["body"], "Extra towels please");
    assert_eq!(body["room"], "412");
    assert!(body.get("token_id").is_none());
    assert_eq!(
        response.header(CORRELATION_ID_HEADER).to_str().unwrap(),
        correlation.to_string()
    );
}

#[tokio::test]
async fn order_validation_is_unprocessable() {
    let app = App::new();
    let token = app.booking(8, Some("101")).await;

    let (name, value) = guest_header(&token);
    let empty = app
        .server
        .post(&format!("/api/v1/hotels/{HOTEL}/guest/orders"))
        .add_header(name, value)
        .json(&json!({ "lines": [] }))
        .await;
    empty.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let (name, value) = guest_header(&token);
    let malformed = app
        .server
        .post(&format!("/api/v1/hotels/{HOTEL}/guest/orders"))
        .add_header(name, value)
        .json(&json!({ "items": "tea" }))
        .await;
    malformed.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = malformed.json();
    assert_eq!(body["code"], "INVALID_INPUT");

    let (name, value) = guest_header(&token);
    let ok = app
        .server
        .post(&format!("/api/v1/hotels/{HOTEL}/guest/orders"))
        .add_header(name, value)
        .json(&json!({ "lines": [{ "item": "Club sandwich", "quantity": 2 }] }))
        .await;
    ok.assert_status(StatusCode::CREATED);
    let body: Value = ok.json();
    assert_eq!(body["room"], "101");
    assert_eq!(body["lines"][0]["quantity"], 2);
}

#[tokio::test]
async fn realtime_auth_requires_a_credential() {
    let app = App::new();
    let response = app
        .server
        .post("/api/v1/realtime/auth")
        .json(&json!({ "socket_id": "1.2", "channel_name": "private-guest-booking-1" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn guest_gets_only_its_own_channel() {
    let app = App::new();
    let token = app.booking(1042, None).await;

    let (name, value) = guest_header(&token);
    let own = app
        .server
        .post("/api/v1/realtime/auth")
        .add_header(name, value)
        .json(&json!({
            "socket_id": "123.456",
            "channel_name": "private-guest-booking-1042",
            "hotel": HOTEL,
        }))
        .await;
    own.assert_status_ok();
    let grant: Value = own.json();
    assert_eq!(grant["channel"], "private-guest-booking-1042");
    assert!(grant["auth"].as_str().unwrap().starts_with("test-key:"));
    assert!(grant["subject"].get("token_id").is_none());

    let staff_channel = format!("private-hotel-{HOTEL}-{}", StaffTopic::Bookings.as_str());
    let (name, value) = guest_header(&token);
    let staff = app
        .server
        .post("/api/v1/realtime/auth")
        .add_header(name, value)
        .json(&json!({ "socket_id": "123.456", "channel_name": staff_channel, "hotel": HOTEL }))
        .await;
    staff.assert_status(StatusCode::FORBIDDEN);

    let (name, value) = guest_header(&token);
    let no_hotel = app
        .server
        .post("/api/v1/realtime/auth")
        .add_header(name, value)
        .json(&json!({ "socket_id": "123.456", "channel_name": "private-guest-booking-1042" }))
        .await;
    no_hotel.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn staff_bearer_is_scoped_to_its_hotel() {
    let app = App::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {STAFF_SESSION}")).unwrap();

    let own = app
        .server
        .post("/api/v1/realtime/auth")
        .add_header(header::AUTHORIZATION, bearer.clone())
        .json(&json!({ "socket_id": "9.9", "channel_name": "private-hotel-grand-plaza-chat" }))
        .await;
    own.assert_status_ok();

    let other = app
        .server
        .post("/api/v1/realtime/auth")
        .add_header(header::AUTHORIZATION, bearer)
        .json(&json!({ "socket_id": "9.9", "channel_name": "private-hotel-seaside-inn-chat" }))
        .await;
    other.assert_status(StatusCode::FORBIDDEN);

    let unknown = app
        .server
        .post("/api/v1/realtime/auth")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"))
        .json(&json!({ "socket_id": "9.9", "channel_name": "private-hotel-grand-plaza-chat" }))
        .await;
    unknown.assert_status(StatusCode::UNAUTHORIZED);
}
