//! Audit Records
//!
//! Value types produced by the audit interceptor and consumed by observers.
//!
//! # Design
//!
//! An [`Event`] is created once per intercepted call and shared read-only
//! across every subscriber as `Arc<Event>`. A [`StatWindow`] is the mutable
//! accumulator owned by exactly one statistics stream; flushing it yields an
//! immutable [`Stat`] snapshot and resets the window.

use std::collections::BTreeMap;

use chrono::Utc;

// =============================================================================
// Event
// =============================================================================

/// One intercepted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Seconds since the Unix epoch when the call arrived.
    pub timestamp: i64,
    /// Caller identity from the `consumer` metadata key (may be empty).
    pub consumer: String,
    /// Fully-qualified method name, e.g. `/audit.v1.BizService/Check`.
    pub method: String,
    /// Caller network address (may be empty).
    pub host: String,
}

impl Event {
    /// Create an event stamped with the current wall-clock time.
    #[must_use]
    pub fn now(
        consumer: impl Into<String>,
        method: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            consumer: consumer.into(),
            method: method.into(),
            host: host.into(),
        }
    }
}

// =============================================================================
// Stat
// =============================================================================

/// Call counters flushed at the end of one statistics window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    /// Seconds since the Unix epoch at flush time.
    pub timestamp: i64,
    /// Calls per fully-qualified method.
    pub by_method: BTreeMap<String, u64>,
    /// Calls per consumer.
    pub by_consumer: BTreeMap<String, u64>,
}

impl Stat {
    /// Total number of calls counted in this snapshot.
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.by_method.values().sum()
    }
}

/// Mutable accumulator for a single statistics stream.
#[derive(Debug, Default)]
pub struct StatWindow {
    by_method: BTreeMap<String, u64>,
    by_consumer: BTreeMap<String, u64>,
}

impl StatWindow {
    /// Create an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event against its method and consumer.
    pub fn record(&mut self, event: &Event) {
        *self.by_method.entry(event.method.clone()).or_insert(0) += 1;
        *self.by_consumer.entry(event.consumer.clone()).or_insert(0) += 1;
    }

    /// Take a snapshot stamped with `timestamp` and reset the window.
    ///
    /// An empty window still produces a snapshot with empty maps.
    pub fn flush(&mut self, timestamp: i64) -> Stat {
        let window = std::mem::take(self);
        Stat {
            timestamp,
            by_method: window.by_method,
            by_consumer: window.by_consumer,
        }
    }

    /// Snapshot stamped with the current wall-clock time, then reset.
    pub fn flush_now(&mut self) -> Stat {
        self.flush(Utc::now().timestamp())
    }
}

// =============================================================================
// Tests
// =============================================================================
