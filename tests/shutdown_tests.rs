use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use notification_orchestrator::{
    broker::Publisher,
    clients::memory::{MemoryBroker, MemoryPublisher},
    error::BrokerError,
    models::pool::{DrainOutcome, PoolState},
    pool::ConsumerPool,
};
use tokio::time::sleep;

use crate::common::{FaultyConnector, Harness, TOPIC, build_processor, registration};

/// Test: Closing a pool that never started still ends Closed
#[tokio::test]
async fn test_close_idle_pool() {
    let broker = Arc::new(MemoryBroker::new(TOPIC, 1));
    let processor = build_processor(Arc::new(MemoryPublisher::new()));
    let mut pool = ConsumerPool::new(broker, processor, Duration::from_secs(1));

    let outcome = pool.close().await.unwrap();

    assert_eq!(outcome, DrainOutcome::Drained);
    assert_eq!(pool.state(), PoolState::Closed);
}

/// Test: Workers with nothing in flight drain immediately
#[tokio::test]
async fn test_close_empty_pool_drains() {
    let mut harness = Harness::start(2, MemoryPublisher::new(), Duration::from_secs(2));
    let state = harness.pool.subscribe_state();
    assert_eq!(*state.borrow(), PoolState::Running);

    let start = Instant::now();
    let outcome = harness.pool.close().await.unwrap();

    assert_eq!(outcome, DrainOutcome::Drained);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(*state.borrow(), PoolState::Closed);
    assert_eq!(harness.pool.active_workers(), 0);
}

/// Test: An in-flight message finishes when it fits in the grace period
#[tokio::test]
async fn test_in_flight_message_completes_within_grace() {
    let publisher = MemoryPublisher::new().with_delay(Duration::from_millis(200));
    let mut harness = Harness::start(1, publisher, Duration::from_secs(2));

    harness.send(
        "a@x.com",
        "UserRegistered",
        registration(42, "a@x.com", "Ann", "+1555"),
    );
    sleep(Duration::from_millis(50)).await;

    let outcome = harness.pool.close().await.unwrap();

    assert_eq!(outcome, DrainOutcome::Drained);
    assert_eq!(harness.publisher.sent_count(), 1);
    assert_eq!(harness.broker.committed().len(), 1);
    assert_eq!(harness.pool.state(), PoolState::Closed);
}

/// Test: Work still running at the deadline is aborted without publishing
#[tokio::test]
async fn test_grace_period_bounds_shutdown() {
    let grace = Duration::from_millis(300);
    let publisher = MemoryPublisher::new().with_delay(Duration::from_secs(5));
    let mut harness = Harness::start(1, publisher, grace);

    harness.send(
        "a@x.com",
        "UserRegistered",
        registration(42, "a@x.com", "Ann", "+1555"),
    );
    sleep(Duration::from_millis(50)).await;

    let start = Instant::now();
    let outcome = harness.pool.close().await.unwrap();

    assert_eq!(outcome, DrainOutcome::Aborted { workers: 1 });
    assert!(start.elapsed() < grace + Duration::from_millis(500));
    assert_eq!(harness.publisher.sent_count(), 0);
    assert!(harness.broker.committed().is_empty());
    assert_eq!(harness.pool.state(), PoolState::Closed);
}

/// Test: Nothing new is pulled once cancellation is requested
#[tokio::test]
async fn test_no_new_messages_after_cancel() {
    let mut harness = Harness::start(1, MemoryPublisher::new(), Duration::from_secs(2));

    harness.pool.cancel();
    assert_eq!(harness.pool.state(), PoolState::ShuttingDown);
    sleep(Duration::from_millis(100)).await;

    harness.send(
        "a@x.com",
        "UserRegistered",
        registration(42, "a@x.com", "Ann", "+1555"),
    );
    sleep(Duration::from_millis(100)).await;

    assert_eq!(harness.publisher.sent_count(), 0);
    assert!(harness.broker.committed().is_empty());

    let outcome = harness.pool.close().await.unwrap();
    assert_eq!(outcome, DrainOutcome::Drained);
    assert_eq!(harness.pool.state(), PoolState::Closed);
}

/// Test: The producer is closed only after the consumer side has drained
#[tokio::test]
async fn test_publisher_closed_after_pool() {
    let publisher = MemoryPublisher::new().with_delay(Duration::from_millis(100));
    let mut harness = Harness::start(1, publisher, Duration::from_secs(2));

    harness.send(
        "a@x.com",
        "UserRegistered",
        registration(42, "a@x.com", "Ann", "+1555"),
    );
    sleep(Duration::from_millis(20)).await;

    harness.pool.close().await.unwrap();
    assert!(!harness.publisher.is_closed());

    harness.publisher.close().await.unwrap();

    assert!(harness.publisher.is_closed());
    assert_eq!(harness.publisher.sent_count(), 1);
}

/// Test: A source that fails to close is reported by close, and the pool still ends Closed
#[tokio::test]
async fn test_close_returns_source_close_error() {
    let connector = FaultyConnector {
        panic_worker: None,
        fail_close: true,
    };
    let processor = build_processor(Arc::new(MemoryPublisher::new()));
    let mut pool = ConsumerPool::new(connector, processor, Duration::from_secs(2));
    pool.start(2).unwrap();

    let result = pool.close().await;

    assert!(matches!(result, Err(BrokerError::Consumer(_))));
    assert_eq!(pool.state(), PoolState::Closed);
    assert_eq!(pool.live_workers(), 0);
}
