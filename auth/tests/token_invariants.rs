//! Token lifecycle invariants under concurrency and across time.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::Duration;
use common::Harness;
use proptest::prelude::*;
use stayline_auth::AccessError;
use stayline_auth::token::{RevocationReason, TokenStatus};
use stayline_core::BookingId;
use stayline_core::environment::Clock;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// However many issuances race, a booking ends with exactly one active
    /// token and every other token revoked as superseded.
    #[test]
    fn concurrent_issuance_leaves_one_active_token(racers in 2usize..8, bookings in 1i64..4) {
        let rt = runtime();
        let (results, store) = rt.block_on(async {
            let h = Harness::new();
            let mut handles = Vec::new();
            for i in 0..racers {
                let tokens = h.tokens.clone();
                let booking = BookingId(1 + (i as i64 % bookings));
                handles.push(tokio::spawn(async move { tokens.issue(booking, None).await }));
            }
            let mut results = Vec::new();
            for handle in handles {
                results.push(handle.await.unwrap());
            }
            (results, h.store)
        });

        for result in &results {
            prop_assert!(result.is_ok(), "issue failed: {:?}", result);
        }
        prop_assert_eq!(store.all().len(), racers);

        for id in 1..=bookings {
            let booking = BookingId(id);
            let issued = results
                .iter()
                .filter(|r| r.as_ref().is_ok_and(|t| t.booking_id == booking))
                .count();
            if issued == 0 {
                continue;
            }
            prop_assert_eq!(store.active_for(booking).len(), 1);
            for token in store.all().into_iter().filter(|t| t.booking_id == booking) {
                if token.status == TokenStatus::Revoked {
                    prop_assert_eq!(token.revoked_reason, Some(RevocationReason::Superseded));
                }
            }
        }
    }

    /// A token is unusable from its expiry onward, whatever its status.
    #[test]
    fn expiry_is_checked_regardless_of_status(offset_minutes in -120i64..120, revoke in any::<bool>()) {
        let rt = runtime();
        let (outcome, expires_at, now) = rt.block_on(async {
            let h = Harness::new();
            let expires_at = h.clock.now() + Duration::hours(1);
            let issued = h.tokens.issue_with_expiry(BookingId(1), expires_at).await.unwrap();
            if revoke {
                h.tokens.revoke(BookingId(1), RevocationReason::Manual).await.unwrap();
            }
            h.clock.advance(Duration::hours(1) + Duration::minutes(offset_minutes));
            let outcome = h.tokens.validate(issued.raw.expose()).await;
            (outcome, expires_at, h.clock.now())
        });

        let usable = !revoke && now < expires_at;
        match outcome {
            Ok(_) => prop_assert!(usable),
            Err(e) => {
                prop_assert!(!usable);
                prop_assert_eq!(e, AccessError::TokenInvalid);
            }
        }
    }
}

#[tokio::test]
async fn reissue_supersedes_and_keeps_history() {
    let h = Harness::new();
    let first = h.tokens.issue(BookingId(1), None).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    let second = h.tokens.issue(BookingId(1), None).await.unwrap();

    assert_eq!(second.superseded, Some(first.token_id));
    assert_eq!(
        h.tokens.validate(first.raw.expose()).await.unwrap_err(),
        AccessError::TokenInvalid
    );
    assert!(h.tokens.validate(second.raw.expose()).await.is_ok());

    let history = h.tokens.history(BookingId(1)).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].revoked_reason, Some(RevocationReason::Superseded));
}

#[tokio::test]
async fn issuance_survives_transient_conflicts() {
    let h = Harness::new();
    h.store.force_conflicts(3);

    let issued = h.tokens.issue(BookingId(5), None).await.unwrap();

    let active = h.store.active_for(BookingId(5));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, issued.token_id);
}

#[tokio::test]
async fn revocation_is_idempotent() {
    let h = Harness::new();
    let issued = h.tokens.issue(BookingId(3), None).await.unwrap();

    let first = h.tokens.revoke(BookingId(3), RevocationReason::CheckedOut).await.unwrap();
    let second = h.tokens.revoke(BookingId(3), RevocationReason::Cancelled).await.unwrap();

    assert_eq!(first, Some(issued.token_id));
    assert_eq!(second, None);
    let all = h.store.all();
    assert_eq!(all[0].revoked_reason, Some(RevocationReason::CheckedOut));
}

#[tokio::test]
async fn store_outage_is_not_reported_as_an_invalid_token() {
    let h = Harness::new();
    h.store.set_available(false);

    let err = h.tokens.validate(&"A".repeat(43)).await.unwrap_err();
    assert!(matches!(err, AccessError::Store(_)));
}
