//! gRPC Audit Integration Tests
//!
//! Drives a real server over TCP: ACL enforcement, audit of every call,
//! log fan-out, and statistics windows.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use tokio::time::timeout;
use tonic::{Code, Request};

use audit_hub::proto::{Nothing, StatInterval};
use common::{ADD, CHECK, TEST, TestHub, WAIT, as_consumer, next_events_from};

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn test_allowed_call_succeeds() {
    let hub = TestHub::start().await;
    let mut biz = hub.biz().await;

    assert!(biz.check(as_consumer(Nothing::default(), "biz")).await.is_ok());
    assert!(biz.add(as_consumer(Nothing::default(), "biz")).await.is_ok());
}

#[tokio::test]
async fn test_unlisted_method_is_denied() {
    let hub = TestHub::start().await;
    let mut biz = hub.biz().await;

    let status = biz
        .test(as_consumer(Nothing::default(), "biz"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_unknown_consumer_is_denied() {
    let hub = TestHub::start().await;
    let mut biz = hub.biz().await;

    let status = biz
        .check(as_consumer(Nothing::default(), "intruder"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_missing_consumer_is_denied() {
    let hub = TestHub::start().await;
    let mut biz = hub.biz().await;

    let status = biz.check(Request::new(Nothing::default())).await.unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_denied_stream_never_registers() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;

    let status = admin
        .logging(as_consumer(Nothing::default(), "biz"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
    assert_eq!(hub.registry.subscriber_count().await, 0);
}

#[tokio::test]
async fn test_wildcard_grants_whole_service() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;

    let _logs = admin
        .logging(as_consumer(Nothing::default(), "admin"))
        .await
        .unwrap();
    let _stats = admin
        .statistics(as_consumer(StatInterval { interval_seconds: 60 }, "admin"))
        .await
        .unwrap();

    hub.wait_for_subscribers(2).await;
}

// =============================================================================
// Log Streams
// =============================================================================

#[tokio::test]
async fn test_denied_call_is_still_audited() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;
    let mut biz = hub.biz().await;

    let mut logs = admin
        .logging(as_consumer(Nothing::default(), "logger"))
        .await
        .unwrap()
        .into_inner();

    let status = biz
        .check(as_consumer(Nothing::default(), "intruder"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    let events = next_events_from(&mut logs, "intruder", 1).await;
    assert_eq!(events[0].method, CHECK);
    assert!(events[0].host.starts_with("127.0.0.1:"));
    assert!(events[0].timestamp > 0);
}

#[tokio::test]
async fn test_every_observer_sees_events_in_order() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;
    let mut biz = hub.biz().await;

    let mut first = admin
        .logging(as_consumer(Nothing::default(), "logger"))
        .await
        .unwrap()
        .into_inner();
    let mut second = admin
        .logging(as_consumer(Nothing::default(), "logger"))
        .await
        .unwrap()
        .into_inner();
    hub.wait_for_subscribers(2).await;

    biz.check(as_consumer(Nothing::default(), "biz")).await.unwrap();
    biz.add(as_consumer(Nothing::default(), "biz")).await.unwrap();
    let _ = biz.test(as_consumer(Nothing::default(), "biz")).await;

    for stream in [&mut first, &mut second] {
        let methods: Vec<String> = next_events_from(stream, "biz", 3)
            .await
            .into_iter()
            .map(|e| e.method)
            .collect();
        assert_eq!(methods, vec![CHECK, ADD, TEST]);
    }
}

#[tokio::test]
async fn test_observer_sees_later_observer_registering() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;

    let mut first = admin
        .logging(as_consumer(Nothing::default(), "logger"))
        .await
        .unwrap()
        .into_inner();
    let _second = admin
        .logging(as_consumer(Nothing::default(), "admin"))
        .await
        .unwrap();

    let events = next_events_from(&mut first, "admin", 1).await;
    assert_eq!(events[0].method, "/audit.v1.AdminService/Logging");
}

#[tokio::test]
async fn test_client_disconnect_deregisters() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;

    let logs = admin
        .logging(as_consumer(Nothing::default(), "logger"))
        .await
        .unwrap()
        .into_inner();
    hub.wait_for_subscribers(1).await;

    drop(logs);
    hub.wait_for_subscribers(0).await;
    assert_eq!(hub.service.admin().active_streams(), 0);
}

// =============================================================================
// Statistics Streams
// =============================================================================

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;

    let status = admin
        .statistics(as_consumer(StatInterval { interval_seconds: 0 }, "stats"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(hub.registry.subscriber_count().await, 0);
}

#[tokio::test]
async fn test_statistics_window_counts_then_resets() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;
    let mut biz = hub.biz().await;

    let mut stats = admin
        .statistics(as_consumer(StatInterval { interval_seconds: 1 }, "stats"))
        .await
        .unwrap()
        .into_inner();

    biz.check(as_consumer(Nothing::default(), "biz")).await.unwrap();
    biz.check(as_consumer(Nothing::default(), "biz")).await.unwrap();
    biz.add(as_consumer(Nothing::default(), "biz")).await.unwrap();
    let _ = biz.check(as_consumer(Nothing::default(), "intruder")).await;

    let window = timeout(WAIT, stats.message()).await.unwrap().unwrap().unwrap();
    assert_eq!(window.by_consumer.get("biz"), Some(&3));
    assert_eq!(window.by_consumer.get("intruder"), Some(&1));
    assert_eq!(window.by_method.get(CHECK), Some(&3));
    assert_eq!(window.by_method.get(ADD), Some(&1));
    assert!(window.timestamp > 0);

    let empty = timeout(WAIT, stats.message()).await.unwrap().unwrap().unwrap();
    assert!(empty.by_consumer.is_empty());
    assert!(empty.by_method.is_empty());
    assert!(empty.timestamp >= window.timestamp);
}

#[tokio::test]
async fn test_statistics_first_flush_waits_full_interval() {
    let hub = TestHub::start().await;
    let mut admin = hub.admin().await;

    let mut stats = admin
        .statistics(as_consumer(StatInterval { interval_seconds: 2 }, "stats"))
        .await
        .unwrap()
        .into_inner();

    assert!(
        timeout(Duration::from_millis(1500), stats.message())
            .await
            .is_err()
    );
}
