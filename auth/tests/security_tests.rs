//! Security properties of guest access and channel authorization.
//!
//! - Guest credentials never receive a grant in the staff namespace, and
//!   that decision is made on the channel name alone.
//! - A guest is granted exactly one channel: the one derived from its own
//!   booking.
//! - Every token rejection looks the same from outside.
//! - Staff are confined to their own hotel's channels.
//! - Grants are bound to one socket, one channel and a deadline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::Duration;
use common::{HOTEL, Harness, STAFF_SESSION};
use proptest::prelude::*;
use stayline_auth::token::{GuestAccessToken, RevocationReason};
use stayline_auth::{AccessError, AccessTier, Credential, GrantSubject};
use stayline_core::BookingId;
use stayline_core::channel::{Channel, STAFF_CHANNEL_PREFIX, StaffTopic};
use stayline_core::environment::Clock;
use stayline_core::outbox::{DetachedUnit, UnitOfWork};
use stayline_testing::BookingFixture;
use stayline_testing::fixtures::hotel;
use stayline_testing::test_epoch;

const SOCKET: &str = "1234.5678";

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn checked_in_guest(h: &Harness, id: i64) -> Credential {
    let (booking, raw) = h.create_booking(id).await;
    h.directory.check_in(booking.id, test_epoch());
    Credential::Guest {
        token: raw,
        hotel: hotel(HOTEL),
    }
}

fn staff() -> Credential {
    Credential::Staff {
        session_id: STAFF_SESSION.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Namespace separation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn every_prefix_of_the_staff_namespace_is_denied_to_guests() {
    let h = Harness::new();
    let guest = checked_in_guest(&h, 1).await;

    for end in 0..=STAFF_CHANNEL_PREFIX.len() {
        let name = &STAFF_CHANNEL_PREFIX[..end];
        let err = h.gateway.authorize(&guest, SOCKET, name).await.unwrap_err();
        assert_eq!(err, AccessError::ChannelDenied, "prefix {name:?}");
    }
}

#[tokio::test]
async fn staff_namespace_is_denied_before_the_token_is_examined() {
    let h = Harness::new();
    // Store is down: any token lookup would fail with a store error.
    h.store.set_available(false);
    let guest = Credential::Guest {
        token: "x".repeat(43),
        hotel: hotel(HOTEL),
    };

    let err = h
        .gateway
        .authorize(&guest, SOCKET, "private-hotel-grand-plaza-chat")
        .await
        .unwrap_err();
    assert_eq!(err, AccessError::ChannelDenied);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn guest_never_gets_a_staff_channel(
        slug in "[a-z0-9][a-z0-9-]{0,20}",
        topic in prop::sample::select(StaffTopic::ALL.to_vec()),
        suffix in "[a-z0-9_-]{0,8}",
    ) {
        let rt = runtime();
        let outcomes = rt.block_on(async {
            let h = Harness::new();
            let guest = checked_in_guest(&h, 1).await;
            let canonical = Channel::staff(hotel(&slug), topic).name();
            let extended = format!("{canonical}{suffix}");
            let mut out = Vec::new();
            for name in [canonical, extended] {
                out.push(h.gateway.authorize(&guest, SOCKET, &name).await);
            }
            out
        });
        for outcome in outcomes {
            prop_assert_eq!(outcome.unwrap_err(), AccessError::ChannelDenied);
        }
    }

    #[test]
    fn guest_is_granted_only_its_own_channel(name in "[a-z0-9-]{0,40}", other in 2i64..10_000) {
        let rt = runtime();
        let (arbitrary, foreign) = rt.block_on(async {
            let h = Harness::new();
            let guest = checked_in_guest(&h, 1).await;
            let arbitrary = h.gateway.authorize(&guest, SOCKET, &name).await;
            let foreign = h
                .gateway
                .authorize(&guest, SOCKET, &Channel::guest(BookingId(other)).name())
                .await;
            (arbitrary, foreign)
        });

        if name == "private-guest-booking-1" {
            prop_assert!(arbitrary.is_ok());
        } else {
            prop_assert!(arbitrary.is_err());
        }
        prop_assert_eq!(foreign.unwrap_err(), AccessError::ChannelDenied);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Anti-enumeration
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn every_token_rejection_is_indistinguishable() {
    let h = Harness::new();

    // Revoked
    let (revoked_booking, revoked) = h.create_booking(2).await;
    h.tokens
        .revoke(revoked_booking.id, RevocationReason::Manual)
        .await
        .unwrap();

    // Expired
    let (_, expired) = h.create_booking(3).await;
    let expired_row: GuestAccessToken = h
        .store
        .active_for(BookingId(3))
        .pop()
        .unwrap();
    h.store.put(GuestAccessToken {
        expires_at: h.clock.now() - Duration::seconds(1),
        ..expired_row
    });

    // Booking deleted after issuance
    let (_, orphan) = h.create_booking(4).await;
    h.directory.remove(BookingId(4));

    let candidates = [
        String::new(),
        "short".to_string(),
        "!".repeat(43),
        "A".repeat(43),
        revoked,
        expired,
        orphan,
    ];

    for raw in &candidates {
        let err = h
            .resolver
            .resolve(raw, &hotel(HOTEL), AccessTier::ReadOnly)
            .await
            .unwrap_err();
        assert_eq!(err, AccessError::TokenInvalid, "{raw:?}");
        assert_eq!(err.to_string(), AccessError::TokenInvalid.to_string());
    }
}

#[tokio::test]
async fn token_from_another_hotel_is_a_hotel_mismatch() {
    let h = Harness::new();
    let (_, raw) = h.create_booking(5).await;

    let err = h
        .resolver
        .resolve(&raw, &hotel("seaside-inn"), AccessTier::ReadOnly)
        .await
        .unwrap_err();
    assert_eq!(err, AccessError::HotelMismatch);
}

// ═══════════════════════════════════════════════════════════════════════
// Staff confinement
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn staff_are_confined_to_their_own_hotel() {
    let h = Harness::new();

    for topic in StaffTopic::ALL {
        let own = Channel::staff(hotel(HOTEL), topic).name();
        let grant = h.gateway.authorize(&staff(), SOCKET, &own).await.unwrap();
        assert!(matches!(grant.subject, GrantSubject::Staff { .. }));

        let other = Channel::staff(hotel("seaside-inn"), topic).name();
        let err = h.gateway.authorize(&staff(), SOCKET, &other).await.unwrap_err();
        assert_eq!(err, AccessError::ChannelDenied);
    }

    let guest_channel = h
        .gateway
        .authorize(&staff(), SOCKET, "private-guest-booking-1")
        .await
        .unwrap_err();
    assert_eq!(guest_channel, AccessError::ChannelDenied);
}

#[tokio::test]
async fn unknown_or_expired_staff_session_is_unauthenticated() {
    let h = Harness::new();
    let unknown = Credential::Staff {
        session_id: "nope".to_string(),
    };
    let err = h
        .gateway
        .authorize(&unknown, SOCKET, "private-hotel-grand-plaza-chat")
        .await
        .unwrap_err();
    assert_eq!(err, AccessError::Unauthenticated);

    h.clock.advance(Duration::hours(9));
    let err = h
        .gateway
        .authorize(&staff(), SOCKET, "private-hotel-grand-plaza-chat")
        .await
        .unwrap_err();
    assert_eq!(err, AccessError::Unauthenticated);
}

// ═══════════════════════════════════════════════════════════════════════
// Grants
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn grant_is_bound_to_socket_channel_and_deadline() {
    let h = Harness::new();
    let guest = checked_in_guest(&h, 6).await;
    let channel = "private-guest-booking-6";

    let grant = h.gateway.authorize(&guest, SOCKET, channel).await.unwrap();
    let signer = h.gateway.signer();
    let now = h.clock.now();

    assert!(signer.verify(SOCKET, channel, &grant.auth, grant.expires_at, now));
    assert!(!signer.verify("9999.1", channel, &grant.auth, grant.expires_at, now));
    assert!(!signer.verify(SOCKET, "private-guest-booking-7", &grant.auth, grant.expires_at, now));
    assert!(!signer.verify(
        SOCKET,
        channel,
        &grant.auth,
        grant.expires_at + Duration::minutes(5),
        now
    ));
    assert!(!signer.verify(SOCKET, channel, &grant.auth, grant.expires_at, grant.expires_at));
}

#[tokio::test]
async fn malformed_socket_id_is_rejected_before_anything_else() {
    let h = Harness::new();
    let guest = checked_in_guest(&h, 8).await;

    for socket in ["", "abc def", "sock/1", &"1".repeat(80)] {
        let err = h
            .gateway
            .authorize(&guest, socket, "private-guest-booking-8")
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidInput(_)), "{socket:?}");
    }
}

#[tokio::test]
async fn cancelled_booking_loses_realtime_access() {
    let h = Harness::new();
    let booking = BookingFixture::new(9, HOTEL).build();
    h.directory.insert(booking.clone());
    let issued = h.tokens.issue(booking.id, Some(booking.departure)).await.unwrap();

    let guest = Credential::Guest {
        token: issued.raw.expose().to_string(),
        hotel: hotel(HOTEL),
    };
    assert!(h.gateway.authorize(&guest, SOCKET, "private-guest-booking-9").await.is_ok());

    h.directory.cancel(booking.id, h.clock.now());
    let mut unit = DetachedUnit::new();
    h.hooks
        .cancelled(unit.outbox(), &booking, Some("guest request".to_string()))
        .unwrap();
    let handle = h.emitter.commit(unit).await.unwrap();
    assert_eq!(handle.follow_ups_failed(), 0);

    let err = h
        .gateway
        .authorize(&guest, SOCKET, "private-guest-booking-9")
        .await
        .unwrap_err();
    assert_eq!(err, AccessError::TokenInvalid);
}
