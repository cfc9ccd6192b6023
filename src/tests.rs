// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! Integration tests covering delivery, replay, retention, handle lifecycle
//! and the conduit surfaces.
//!
//! Tests are grouped by section headers. The test names follow the pattern
//! `<feature>_<scenario>` and are designed to be self-documenting.
//!
//! # Key Properties Verified
//!
//! - **Delivery**: per-consumer in-order delivery, independent replay for
//!   every consumer, new-consumer replay from the oldest retained offset.
//! - **Retention**: counted and consumed policies trim on segment
//!   boundaries, timed policies expire backlog, closing a consumer releases
//!   its unread backlog, permanent topics never trim.
//! - **Lifecycle**: idempotent close reporting, benign closed outcomes for
//!   `send`/`recv`, panicking `must_` variants, producer close drains
//!   in-flight messages.
//! - **Conduits**: zero-duration polls return immediately, raw sender and
//!   receiver access stay live.

use std::time::{Duration, Instant};

use crate::backoff::Backoff;
use crate::error::Error;
use crate::{dynamic, Consumer, Producer, Topic};

const LONG: Duration = Duration::from_secs(5);

async fn recv_within(consumer: &mut Consumer<u64>) -> u64 {
    tokio::time::timeout(LONG, consumer.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("consumer closed unexpectedly")
}

async fn send_all(producer: &Producer<u64>, values: std::ops::Range<u64>) {
    for value in values {
        assert!(producer.send(value).await, "send failed at {value}");
    }
}

/// Waits until a freshly attached consumer's first message is `expected`,
/// closing each probe. Gives retention trimming time to converge.
async fn wait_for_first_message(topic: &Topic<u64>, expected: u64) {
    let deadline = Instant::now() + LONG;
    loop {
        let mut probe = topic.consumer();
        let first = probe.poll(Duration::from_millis(100)).await;
        probe.close().unwrap();
        if first == Some(expected) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "trimming never converged; last first message: {first:?}"
        );
        // Longer than the backoff ceiling, so the vacuum task is guaranteed
        // a wake-up while no probe cursor is registered.
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
}

/// Waits until a freshly attached consumer sees nothing at all.
async fn wait_for_empty(topic: &Topic<u64>) {
    let deadline = Instant::now() + LONG;
    loop {
        let mut probe = topic.consumer();
        let first = probe.poll(Duration::from_millis(100)).await;
        probe.close().unwrap();
        if first.is_none() {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "backlog never fully trimmed; still seeing {first:?}"
        );
        // Longer than the backoff ceiling, so the vacuum task is guaranteed
        // a wake-up while no probe cursor is registered.
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
}

// =========================================================================
// Delivery and replay
// =========================================================================

// Two independent consumers on a permanent topic each receive every message
// in send order, regardless of interleaving.
#[tokio::test]
async fn permanent_two_consumers_replay_independently_in_order() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    let mut first = topic.consumer();
    let mut second = topic.consumer();

    send_all(&producer, 0..3).await;

    for expected in 0..3 {
        assert_eq!(recv_within(&mut first).await, expected);
    }
    for expected in 0..3 {
        assert_eq!(recv_within(&mut second).await, expected);
    }

    producer.close().unwrap();
    first.close().unwrap();
    second.close().unwrap();
}

// A consumer created after all sends still replays the full stream from
// offset 0 on a permanent topic.
#[tokio::test]
async fn permanent_late_consumer_replays_from_the_start() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    send_all(&producer, 0..100).await;
    producer.close().unwrap();

    let mut consumer = topic.consumer();
    for expected in 0..100 {
        assert_eq!(recv_within(&mut consumer).await, expected);
    }
    consumer.close().unwrap();
}

// A slow producer/fast consumer pair moves a long stream through the
// capacity-one conduits without loss or reordering.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delivery_long_stream_arrives_complete_and_ordered() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    let mut consumer = topic.consumer();

    let feeder = tokio::spawn(async move {
        send_all(&producer, 0..10_000).await;
        producer.close().unwrap();
    });

    for expected in 0..10_000 {
        assert_eq!(recv_within(&mut consumer).await, expected);
    }
    feeder.await.unwrap();
    consumer.close().unwrap();
}

// =========================================================================
// Retention
// =========================================================================

// Counted(100) over 256 messages with the default segment capacity of 32:
// trimming lands on the nearest segment boundary, so a fresh consumer first
// receives message 128 (offsets 0..127 span four fully discardable segments).
#[tokio::test]
async fn counted_retention_trims_to_the_segment_boundary() {
    let topic: Topic<u64> = Topic::builder().retain_last(100).build().unwrap();
    let producer = topic.producer();
    send_all(&producer, 0..256).await;
    producer.close().unwrap();

    wait_for_first_message(&topic, 128).await;
    assert_eq!(topic.length(), 256);
}

// Consumed retention with segment capacity 32: after one consumer reads 43
// messages, only the first segment (offsets 0..31) is fully consumed, so a
// second consumer first receives message 32.
#[tokio::test]
async fn consumed_retention_releases_fully_read_segments() {
    let topic: Topic<u64> = Topic::builder()
        .retain_consumed()
        .segment_capacity(32)
        .build()
        .unwrap();
    let producer = topic.producer();
    let mut reader = topic.consumer();

    send_all(&producer, 0..128).await;
    producer.close().unwrap();

    for expected in 0..43 {
        assert_eq!(recv_within(&mut reader).await, expected);
    }

    wait_for_first_message(&topic, 32).await;
    reader.close().unwrap();
}

// Closing the only consumer removes its cursor from the retention
// computation; with nobody left to replay to, consumed retention discards
// the entire backlog.
#[tokio::test]
async fn consumed_retention_discards_everything_without_cursors() {
    let topic: Topic<u64> = Topic::builder()
        .retain_consumed()
        .segment_capacity(4)
        .build()
        .unwrap();
    let producer = topic.producer();
    let reader = topic.consumer();

    send_all(&producer, 0..8).await;
    producer.close().unwrap();
    reader.close().unwrap();

    wait_for_empty(&topic).await;
    assert_eq!(topic.length(), 8);
}

// Timed retention expires sealed segments once their newest entry is older
// than the window; a fresh consumer then sees nothing.
#[tokio::test]
async fn timed_retention_expires_stale_backlog() {
    let topic: Topic<u64> = Topic::builder()
        .retain_for(Duration::from_millis(50))
        .segment_capacity(4)
        .build()
        .unwrap();
    let producer = topic.producer();
    send_all(&producer, 0..8).await;
    producer.close().unwrap();

    wait_for_empty(&topic).await;
}

// A permanent topic never trims: long after the sends, a fresh consumer
// still starts at message 0.
#[tokio::test]
async fn permanent_retention_never_trims() {
    let topic: Topic<u64> = Topic::builder()
        .retain_permanently()
        .segment_capacity(4)
        .build()
        .unwrap();
    let producer = topic.producer();
    send_all(&producer, 0..64).await;
    producer.close().unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    wait_for_first_message(&topic, 0).await;
}

// =========================================================================
// Handle lifecycle
// =========================================================================

// The second close reports the already-closed state instead of repeating
// side effects.
#[tokio::test]
async fn close_second_call_reports_already_closed() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    let consumer = topic.consumer();

    assert!(producer.close().is_ok());
    assert_eq!(producer.close().unwrap_err(), Error::ProducerClosed);
    assert!(producer.is_closed());

    assert!(consumer.close().is_ok());
    assert_eq!(consumer.close().unwrap_err(), Error::ConsumerClosed);
    assert!(consumer.is_closed());
}

// Sending on a closed producer is a benign false, not a panic or an error.
#[tokio::test]
async fn send_on_closed_producer_returns_false() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    producer.close().unwrap();
    assert!(!producer.send(1).await);
}

// Receiving from a closed consumer drains nothing and reports closure as
// `None`.
#[tokio::test]
async fn recv_on_closed_consumer_returns_none() {
    let topic: Topic<u64> = Topic::new();
    let mut consumer = topic.consumer();
    consumer.close().unwrap();
    let outcome = tokio::time::timeout(LONG, consumer.recv()).await;
    assert_eq!(outcome.unwrap(), None);
}

// `must_send` escalates a closed producer to a panic.
#[tokio::test]
#[should_panic(expected = "producer is closed")]
async fn must_send_panics_on_closed_producer() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    producer.close().unwrap();
    producer.must_send(1).await;
}

// `must_recv` escalates a closed consumer to a panic.
#[tokio::test]
#[should_panic(expected = "consumer is closed")]
async fn must_recv_panics_on_closed_consumer() {
    let topic: Topic<u64> = Topic::new();
    let mut consumer = topic.consumer();
    consumer.close().unwrap();
    let _ = consumer.must_recv().await;
}

// A message accepted by `send` right before `close` is still appended; the
// forwarding task drains the conduit before exiting.
#[tokio::test]
async fn producer_close_drains_accepted_messages() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    let mut consumer = topic.consumer();

    assert!(producer.send(7).await);
    producer.close().unwrap();

    assert_eq!(recv_within(&mut consumer).await, 7);
    consumer.close().unwrap();
}

// =========================================================================
// Conduits and polling
// =========================================================================

// A zero-duration poll on an empty topic returns immediately with nothing.
#[tokio::test]
async fn poll_zero_on_empty_topic_returns_none_immediately() {
    let topic: Topic<u64> = Topic::new();
    let mut consumer = topic.consumer();
    let started = Instant::now();
    assert_eq!(consumer.poll(Duration::ZERO).await, None);
    assert!(started.elapsed() < Duration::from_secs(1));
    consumer.close().unwrap();
}

// A cloned raw sender feeds the same forwarding task as `send`.
#[tokio::test]
async fn producer_raw_sender_reaches_the_log() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    let mut consumer = topic.consumer();

    producer.sender().send(11).await.unwrap();
    assert_eq!(recv_within(&mut consumer).await, 11);

    producer.close().unwrap();
    consumer.close().unwrap();
}

// The raw receiver is the same conduit `recv` reads from.
#[tokio::test]
async fn consumer_raw_receiver_reads_the_conduit() {
    let topic: Topic<u64> = Topic::new();
    let producer = topic.producer();
    let mut consumer = topic.consumer();

    assert!(producer.send(3).await);
    let msg = tokio::time::timeout(LONG, consumer.receiver().recv())
        .await
        .unwrap();
    assert_eq!(msg, Some(3));

    producer.close().unwrap();
    consumer.close().unwrap();
}

// A fixed backoff generator is accepted by the builder and still delivers.
#[tokio::test]
async fn fixed_backoff_topic_delivers() {
    let topic: Topic<u64> = Topic::builder()
        .backoff(Backoff::Fixed(Duration::from_millis(5)))
        .build()
        .unwrap();
    let producer = topic.producer();
    let mut consumer = topic.consumer();

    send_all(&producer, 0..10).await;
    for expected in 0..10 {
        assert_eq!(recv_within(&mut consumer).await, expected);
    }

    producer.close().unwrap();
    consumer.close().unwrap();
}

// =========================================================================
// Dynamic facade
// =========================================================================

// The runtime-typed facade moves heterogeneous payloads through the same
// engine and downcasts them back out.
#[tokio::test]
async fn dynamic_topic_round_trips_heterogeneous_payloads() {
    let topic = dynamic::Topic::new();
    let producer = topic.producer();
    let mut consumer = topic.consumer();

    assert!(producer.send(dynamic::message("text".to_string())).await);
    assert!(producer.send(dynamic::message(42u64)).await);

    let first = tokio::time::timeout(LONG, consumer.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        dynamic::payload::<String>(&first).map(String::as_str),
        Some("text")
    );

    let second = tokio::time::timeout(LONG, consumer.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dynamic::payload::<u64>(&second), Some(&42));

    producer.close().unwrap();
    consumer.close().unwrap();
}
