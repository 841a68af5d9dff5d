//! Subscriber Registry
//!
//! Owns the set of observer mailboxes and fans every audit event out to
//! all of them.
//!
//! # Architecture
//!
//! One `tokio::sync::Mutex` guards `{next_id, mailboxes, closed}` and
//! serializes registration, deregistration and broadcast against each
//! other. Each mailbox is a bounded `mpsc` queue, so every subscriber sees
//! events in broadcast order.
//!
//! # Backpressure
//!
//! With [`DeliveryPolicy::Blocking`] a broadcast awaits each mailbox while
//! holding the lock. A subscriber that stops draining its mailbox therefore
//! stalls every other registry operation until it drains or drops its
//! [`Mailbox`]. [`DeliveryPolicy::Lossy`] never waits: a full mailbox loses
//! the event for that subscriber only.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::application::ports::EventSource;
use crate::domain::audit::Event;
use crate::infrastructure::config::RegistrySettings;
use crate::infrastructure::metrics;

// =============================================================================
// Types
// =============================================================================

/// Identifier of a registered subscriber.
pub type SubscriberId = u64;

/// How a broadcast treats a full mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Wait for space while holding the registry lock.
    #[default]
    Blocking,
    /// Drop the event for that subscriber and move on.
    Lossy,
}

impl DeliveryPolicy {
    /// Parse policy from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "lossy" => Self::Lossy,
            _ => Self::Blocking,
        }
    }

    /// Get the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Lossy => "lossy",
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Per-subscriber mailbox capacity (clamped to at least 1).
    pub mailbox_capacity: usize,
    /// Behaviour when a mailbox is full.
    pub policy: DeliveryPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 16,
            policy: DeliveryPolicy::Blocking,
        }
    }
}

impl From<RegistrySettings> for RegistryConfig {
    fn from(settings: RegistrySettings) -> Self {
        Self {
            mailbox_capacity: settings.mailbox_capacity,
            policy: settings.delivery_policy,
        }
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Mailboxes that accepted the event.
    pub delivered: usize,
    /// Mailboxes that were full under [`DeliveryPolicy::Lossy`].
    pub dropped: usize,
    /// Mailboxes whose receiver is gone but not yet deregistered.
    pub disconnected: usize,
}

/// Point-in-time registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Currently registered subscribers.
    pub subscribers: usize,
    /// Total ids handed out so far.
    pub allocated: u64,
    /// Whether shutdown has begun.
    pub closed: bool,
}

// =============================================================================
// Mailbox
// =============================================================================

/// Receive side of one subscriber's queue.
///
/// `recv` yields `None` once the registry removed the subscriber and every
/// queued event has been drained. Dropping the mailbox releases any
/// broadcast blocked on it.
#[derive(Debug)]
pub struct Mailbox {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<Event>>,
}

impl Mailbox {
    /// Subscriber id this mailbox belongs to.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event, or `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.rx.recv().await
    }
}

#[async_trait]
impl EventSource for Mailbox {
    async fn recv(&mut self) -> Option<Arc<Event>> {
        Self::recv(self).await
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    next_id: SubscriberId,
    mailboxes: BTreeMap<SubscriberId, mpsc::Sender<Arc<Event>>>,
    closed: bool,
}

/// Concurrency-safe set of subscriber mailboxes.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use audit_hub::domain::audit::Event;
/// use audit_hub::infrastructure::broadcast::SubscriberRegistry;
///
/// # tokio_test::block_on(async {
/// let registry = SubscriberRegistry::with_defaults();
/// let (_id, mut mailbox) = registry.new_subscriber().await;
///
/// registry.broadcast(Arc::new(Event::now("logger", "/audit.v1.BizService/Check", ""))).await;
/// assert_eq!(mailbox.recv().await.unwrap().consumer, "logger");
/// # });
/// ```
#[derive(Debug)]
pub struct SubscriberRegistry {
    config: RegistryConfig,
    state: Mutex<RegistryState>,
}

impl SubscriberRegistry {
    /// Create a registry with the given configuration.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Create a registry with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RegistryConfig::default())
    }

    /// Delivery policy in effect.
    #[must_use]
    pub const fn policy(&self) -> DeliveryPolicy {
        self.config.policy
    }

    /// Register a new subscriber with an open, empty mailbox.
    ///
    /// After [`shutdown`](Self::shutdown) the returned mailbox is already
    /// closed and the subscriber is never stored.
    pub async fn new_subscriber(&self) -> (SubscriberId, Mailbox) {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;
        let (tx, rx) = mpsc::channel(self.config.mailbox_capacity.max(1));

        if state.closed {
            tracing::warn!(subscriber_id = id, "Registration after shutdown rejected");
            return (id, Mailbox { id, rx });
        }

        state.mailboxes.insert(id, tx);
        metrics::set_subscribers(state.mailboxes.len());
        tracing::debug!(subscriber_id = id, "Subscriber added");
        (id, Mailbox { id, rx })
    }

    /// Close and remove a subscriber's mailbox.
    ///
    /// Returns `false` if `id` was unknown or already removed.
    pub async fn delete_subscriber(&self, id: SubscriberId) -> bool {
        let mut state = self.state.lock().await;
        // Dropping the sender closes the mailbox.
        let removed = state.mailboxes.remove(&id).is_some();
        if removed {
            metrics::set_subscribers(state.mailboxes.len());
            tracing::debug!(subscriber_id = id, "Subscriber deleted");
        }
        removed
    }

    /// Delete every currently registered subscriber, one at a time.
    ///
    /// Returns how many were removed.
    pub async fn delete_all(&self) -> usize {
        let ids: Vec<SubscriberId> = self.state.lock().await.mailboxes.keys().copied().collect();
        let mut removed = 0;
        for id in ids {
            if self.delete_subscriber(id).await {
                removed += 1;
            }
        }
        removed
    }

    /// Stop accepting registrations, then close every mailbox.
    pub async fn shutdown(&self) -> usize {
        self.state.lock().await.closed = true;
        let removed = self.delete_all().await;
        tracing::info!(removed, "Subscriber registry shut down");
        removed
    }

    /// Deliver `event` to every registered mailbox.
    pub async fn broadcast(&self, event: Arc<Event>) -> DeliveryReport {
        let state = self.state.lock().await;
        let mut report = DeliveryReport::default();

        for (id, tx) in &state.mailboxes {
            match self.config.policy {
                DeliveryPolicy::Blocking => match tx.send(Arc::clone(&event)).await {
                    Ok(()) => report.delivered += 1,
                    Err(_) => report.disconnected += 1,
                },
                DeliveryPolicy::Lossy => match tx.try_send(Arc::clone(&event)) {
                    Ok(()) => report.delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(subscriber_id = id, "Mailbox full, event dropped");
                        report.dropped += 1;
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => report.disconnected += 1,
                },
            }
        }

        if report.dropped > 0 {
            metrics::record_events_dropped(report.dropped as u64);
        }
        report
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.mailboxes.len()
    }

    /// Whether shutdown has begun.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Snapshot of registry statistics.
    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.lock().await;
        RegistryStats {
            subscribers: state.mailboxes.len(),
            allocated: state.next_id,
            closed: state.closed,
        }
    }
}

/// Shared registry reference.
pub type SharedRegistry = Arc<SubscriberRegistry>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;

    fn event(method: &str) -> Arc<Event> {
        Arc::new(Event::now("tester", method, "127.0.0.1:1"))
    }

    fn registry(capacity: usize, policy: DeliveryPolicy) -> SubscriberRegistry {
        SubscriberRegistry::new(RegistryConfig {
            mailbox_capacity: capacity,
            policy,
        })
    }

    #[tokio::test]
    async fn ids_are_monotonic() {
        let registry = SubscriberRegistry::with_defaults();
        let (a, _ma) = registry.new_subscriber().await;
        let (b, mb) = registry.new_subscriber().await;
        registry.delete_subscriber(a).await;
        let (c, _mc) = registry.new_subscriber().await;

        assert!(a < b && b < c);
        assert_eq!(mb.id(), b);
        assert_eq!(registry.subscriber_count().await, 2);
    }

    #[tokio::test]
    async fn single_subscriber_receives_in_order() {
        let registry = SubscriberRegistry::with_defaults();
        let (_id, mut mailbox) = registry.new_subscriber().await;

        for i in 0..5 {
            let report = registry.broadcast(event(&format!("/m/{i}"))).await;
            assert_eq!(report.delivered, 1);
        }

        for i in 0..5 {
            let ev = mailbox.recv().await.unwrap();
            assert_eq!(ev.method, format!("/m/{i}"));
        }
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event() {
        let registry = SubscriberRegistry::with_defaults();
        let (_a, mut ma) = registry.new_subscriber().await;
        let (_b, mut mb) = registry.new_subscriber().await;

        let report = registry.broadcast(event("/m/1")).await;
        assert_eq!(report.delivered, 2);

        let ea = ma.recv().await.unwrap();
        let eb = mb.recv().await.unwrap();
        assert!(Arc::ptr_eq(&ea, &eb));
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let registry = SubscriberRegistry::with_defaults();
        let _ = registry.broadcast(event("/m/early")).await;
        let (id, mut mailbox) = registry.new_subscriber().await;
        let _ = registry.broadcast(event("/m/late")).await;
        registry.delete_subscriber(id).await;

        assert_eq!(mailbox.recv().await.unwrap().method, "/m/late");
        assert!(mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let registry = SubscriberRegistry::with_defaults();
        let (a, mut ma) = registry.new_subscriber().await;
        let (_b, mut mb) = registry.new_subscriber().await;

        assert!(registry.delete_subscriber(a).await);
        assert!(!registry.delete_subscriber(a).await);
        assert!(!registry.delete_subscriber(9_999).await);

        let report = registry.broadcast(event("/m/after")).await;
        assert_eq!(report.delivered, 1);
        assert!(ma.recv().await.is_none());
        assert_eq!(mb.recv().await.unwrap().method, "/m/after");
    }

    #[tokio::test]
    async fn deleted_mailbox_drains_before_closing() {
        let registry = SubscriberRegistry::with_defaults();
        let (id, mut mailbox) = registry.new_subscriber().await;
        let _ = registry.broadcast(event("/m/queued")).await;
        registry.delete_subscriber(id).await;

        assert_eq!(mailbox.recv().await.unwrap().method, "/m/queued");
        assert!(mailbox.recv().await.is_none());
        assert!(mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn shutdown_closes_all_and_rejects_new() {
        let registry = SubscriberRegistry::with_defaults();
        let (_a, mut ma) = registry.new_subscriber().await;
        let (_b, mut mb) = registry.new_subscriber().await;

        assert_eq!(registry.shutdown().await, 2);
        assert!(registry.is_closed().await);
        assert!(ma.recv().await.is_none());
        assert!(mb.recv().await.is_none());

        let (_late, mut late) = registry.new_subscriber().await;
        assert!(late.recv().await.is_none());
        assert_eq!(registry.subscriber_count().await, 0);

        let report = registry.broadcast(event("/m/none")).await;
        assert_eq!(report, DeliveryReport::default());

        let stats = registry.stats().await;
        assert!(stats.closed);
        assert_eq!(stats.allocated, 3);
    }

    #[tokio::test]
    async fn blocking_policy_stalls_registry_until_mailbox_drops() {
        let registry = Arc::new(registry(1, DeliveryPolicy::Blocking));
        let (_id, mailbox) = registry.new_subscriber().await;

        // Fills the only slot.
        assert_eq!(registry.broadcast(event("/m/1")).await.delivered, 1);

        let mut blocked = tokio_test::task::spawn(registry.broadcast(event("/m/2")));
        assert_pending!(blocked.poll());

        // The lock is held, so registration waits too.
        let registering = timeout(Duration::from_millis(50), registry.new_subscriber()).await;
        assert!(registering.is_err());

        drop(mailbox);
        assert!(blocked.is_woken());
        let report = assert_ready!(blocked.poll());
        assert_eq!(report.disconnected, 1);
    }

    #[tokio::test]
    async fn lossy_policy_drops_for_full_mailbox_only() {
        let registry = registry(1, DeliveryPolicy::Lossy);
        let (_slow, _slow_mailbox) = registry.new_subscriber().await;
        let (_fast, mut fast_mailbox) = registry.new_subscriber().await;

        assert_eq!(registry.broadcast(event("/m/1")).await.delivered, 2);
        assert_eq!(fast_mailbox.recv().await.unwrap().method, "/m/1");

        let report = timeout(Duration::from_millis(50), registry.broadcast(event("/m/2")))
            .await
            .expect("lossy broadcast must not block");
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(fast_mailbox.recv().await.unwrap().method, "/m/2");
    }

    #[test]
    fn delivery_policy_parsing() {
        assert_eq!(
            DeliveryPolicy::from_str_case_insensitive("LOSSY"),
            DeliveryPolicy::Lossy
        );
        assert_eq!(
            DeliveryPolicy::from_str_case_insensitive("blocking"),
            DeliveryPolicy::Blocking
        );
        assert_eq!(
            DeliveryPolicy::from_str_case_insensitive("unknown"),
            DeliveryPolicy::Blocking
        );
        assert_eq!(DeliveryPolicy::Lossy.as_str(), "lossy");
    }
}
