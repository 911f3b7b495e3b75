//! Integration tests for [`RedpandaEventBus`] against a real Kafka broker.
//!
//! Marked `#[ignore]`: they need Docker and take a while to start the
//! broker. Run them with:
//!
//! ```bash
//! cargo test -p stayline-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use futures::StreamExt;
use stayline_core::channel::{Channel, StaffTopic};
use stayline_core::event_bus::EventBus;
use stayline_core::ids::BookingId;
use stayline_redpanda::RedpandaEventBus;
use stayline_testing::BookingFixture;
use stayline_testing::fixtures::{envelope_for, hotel};
use std::collections::HashSet;
use std::time::Duration;
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

async fn start_broker() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");
    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

/// Publish until the topic exists and the broker acknowledges.
async fn warm_up(bus: &RedpandaEventBus) {
    let booking = BookingFixture::new(999_999, "warmup").build();
    for attempt in 1..=60 {
        if bus
            .publish(&Channel::guest(booking.id), &envelope_for(&booking, 0))
            .await
            .is_ok()
        {
            tokio::time::sleep(Duration::from_secs(2)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(attempt != 60, "Broker never became ready");
    }
}

fn bus(brokers: &str, topic: &str) -> RedpandaEventBus {
    RedpandaEventBus::builder()
        .brokers(brokers)
        .topic(topic)
        .timeout(Duration::from_secs(5))
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus")
}

#[tokio::test]
#[ignore]
async fn deliveries_keep_channel_and_per_channel_order() {
    let (_kafka, brokers) = start_broker().await;
    let bus = bus(&brokers, "realtime-order");
    warm_up(&bus).await;

    let mut stream = bus.subscribe().await.expect("Failed to subscribe");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let booking = BookingFixture::new(1042, "grand-plaza").build();
    let guest = Channel::guest(BookingId(1042));
    let staff = Channel::staff(hotel("grand-plaza"), StaffTopic::Chat);
    for n in 1..=3 {
        bus.publish(&guest, &envelope_for(&booking, n)).await.unwrap();
        bus.publish(&staff, &envelope_for(&booking, 100 + n)).await.unwrap();
    }

    let mut guest_ids = Vec::new();
    let mut staff_ids = Vec::new();
    tokio::time::timeout(Duration::from_secs(15), async {
        while guest_ids.len() < 3 || staff_ids.len() < 3 {
            let delivery = stream.next().await.unwrap().unwrap();
            if delivery.channel == guest {
                guest_ids.push(delivery.envelope.event_id());
            } else if delivery.channel == staff {
                staff_ids.push(delivery.envelope.event_id());
            }
        }
    })
    .await
    .expect("Timed out waiting for deliveries");

    let expected: Vec<_> = (1..=3).map(|n| envelope_for(&booking, n).event_id()).collect();
    assert_eq!(guest_ids, expected);
    assert_eq!(staff_ids.len(), 3);
}

#[tokio::test]
#[ignore]
async fn every_relay_instance_sees_every_record() {
    let (_kafka, brokers) = start_broker().await;
    let bus = bus(&brokers, "realtime-fanout");
    warm_up(&bus).await;

    let mut first = bus.subscribe().await.unwrap();
    let mut second = bus.subscribe().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let booking = BookingFixture::new(7, "grand-plaza").build();
    for n in 1..=4 {
        bus.publish(&Channel::guest(booking.id), &envelope_for(&booking, n))
            .await
            .unwrap();
    }

    for stream in [&mut first, &mut second] {
        let mut seen = HashSet::new();
        tokio::time::timeout(Duration::from_secs(15), async {
            while seen.len() < 4 {
                let delivery = stream.next().await.unwrap().unwrap();
                if delivery.envelope.meta.scope.booking == Some(booking.id) {
                    seen.insert(delivery.envelope.event_id());
                }
            }
        })
        .await
        .expect("Timed out waiting for fan-out");
    }
}

#[tokio::test]
#[ignore]
async fn publish_to_an_unreachable_broker_fails_within_the_timeout() {
    let bus = RedpandaEventBus::builder()
        .brokers("127.0.0.1:1")
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let booking = BookingFixture::new(1, "grand-plaza").build();

    let started = std::time::Instant::now();
    let result = bus
        .publish(&Channel::guest(booking.id), &envelope_for(&booking, 1))
        .await;

    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}
