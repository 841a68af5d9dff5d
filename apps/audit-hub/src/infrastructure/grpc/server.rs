//! gRPC Service Implementations
//!
//! Implements `BizService` (stateless unary calls) and `AdminService`
//! (observer streams fed by the subscriber registry).

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::task::TaskTracker;
use tonic::{Request, Response, Status};

use super::proto::audit::v1::{
    self as proto, Nothing, StatInterval, admin_service_server::AdminService,
    biz_service_server::BizService,
};
use super::sink::GrpcSink;
use crate::application::services::{run_log_stream, run_stats_stream};
use crate::domain::audit::{Event, Stat};
use crate::infrastructure::broadcast::SharedRegistry;
use crate::infrastructure::metrics::{self, StreamKind};

/// Largest accepted statistics window.
pub const MAX_STAT_INTERVAL_SECS: u64 = 86_400;

// =============================================================================
// Type Aliases
// =============================================================================

type ServiceResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

// =============================================================================
// Conversions
// =============================================================================

impl From<&Event> for proto::Event {
    fn from(event: &Event) -> Self {
        Self {
            timestamp: event.timestamp,
            consumer: event.consumer.clone(),
            method: event.method.clone(),
            host: event.host.clone(),
        }
    }
}

impl From<Arc<Event>> for proto::Event {
    fn from(event: Arc<Event>) -> Self {
        Self::from(event.as_ref())
    }
}

impl From<Stat> for proto::Stat {
    fn from(stat: Stat) -> Self {
        Self {
            timestamp: stat.timestamp,
            by_method: stat.by_method.into_iter().collect(),
            by_consumer: stat.by_consumer.into_iter().collect(),
        }
    }
}

// =============================================================================
// Business Service
// =============================================================================

/// Stateless business calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct BizServer;

#[tonic::async_trait]
impl BizService for BizServer {
    async fn check(&self, _request: Request<Nothing>) -> ServiceResult<Nothing> {
        Ok(Response::new(Nothing { dummy: true }))
    }

    async fn add(&self, _request: Request<Nothing>) -> ServiceResult<Nothing> {
        Ok(Response::new(Nothing { dummy: true }))
    }

    async fn test(&self, _request: Request<Nothing>) -> ServiceResult<Nothing> {
        Ok(Response::new(Nothing { dummy: true }))
    }
}

// =============================================================================
// Admin Service
// =============================================================================

/// Observer streams over the subscriber registry.
///
/// Each stream runs on a task tracked here so [`AdminServer::shutdown`] can
/// wait for every loop to return.
#[derive(Debug)]
pub struct AdminServer {
    registry: SharedRegistry,
    tracker: TaskTracker,
    outbound_capacity: usize,
}

impl AdminServer {
    /// Create a new admin server.
    #[must_use]
    pub fn new(registry: SharedRegistry, outbound_capacity: usize) -> Self {
        Self {
            registry,
            tracker: TaskTracker::new(),
            outbound_capacity: outbound_capacity.max(1),
        }
    }

    /// Number of observer loops still running.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting observers, close every mailbox and wait for all loops.
    ///
    /// Returns how many subscribers were still registered.
    pub async fn shutdown(&self) -> usize {
        let closed = self.registry.shutdown().await;
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!(closed, "Admin streams stopped");
        closed
    }

    async fn ensure_open(&self) -> Result<(), Status> {
        if self.registry.is_closed().await {
            return Err(Status::unavailable("server is shutting down"));
        }
        Ok(())
    }
}

#[tonic::async_trait]
impl AdminService for AdminServer {
    type LoggingStream = BoxedStream<proto::Event>;
    type StatisticsStream = BoxedStream<proto::Stat>;

    async fn logging(&self, _request: Request<Nothing>) -> ServiceResult<Self::LoggingStream> {
        self.ensure_open().await?;

        let (id, mailbox) = self.registry.new_subscriber().await;
        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        let registry = Arc::clone(&self.registry);

        self.tracker.spawn(async move {
            metrics::stream_started(StreamKind::Logging);
            tracing::debug!(subscriber_id = id, "Log stream started");

            let exit = run_log_stream(mailbox, GrpcSink::new(tx)).await;
            registry.delete_subscriber(id).await;

            metrics::stream_finished(StreamKind::Logging);
            tracing::debug!(subscriber_id = id, reason = exit.as_str(), "Log stream finished");
        });

        let stream = ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(stream) as Self::LoggingStream))
    }

    async fn statistics(
        &self,
        request: Request<StatInterval>,
    ) -> ServiceResult<Self::StatisticsStream> {
        let interval_seconds = request.into_inner().interval_seconds;
        if interval_seconds == 0 {
            return Err(Status::invalid_argument("interval_seconds must be positive"));
        }
        if interval_seconds > MAX_STAT_INTERVAL_SECS {
            return Err(Status::invalid_argument(format!(
                "interval_seconds must not exceed {MAX_STAT_INTERVAL_SECS}"
            )));
        }
        self.ensure_open().await?;

        let period = Duration::from_secs(interval_seconds);
        let (id, mailbox) = self.registry.new_subscriber().await;
        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        let registry = Arc::clone(&self.registry);

        self.tracker.spawn(async move {
            metrics::stream_started(StreamKind::Statistics);
            tracing::debug!(subscriber_id = id, interval_seconds, "Statistics stream started");

            let result = run_stats_stream(mailbox, GrpcSink::new(tx), period).await;
            registry.delete_subscriber(id).await;

            metrics::stream_finished(StreamKind::Statistics);
            match result {
                Ok(exit) => {
                    tracing::debug!(subscriber_id = id, reason = exit.as_str(), "Statistics stream finished");
                }
                Err(e) => {
                    tracing::debug!(subscriber_id = id, error = %e, "Statistics stream flush failed");
                }
            }
        });

        let stream = ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(stream) as Self::StatisticsStream))
    }
}

// =============================================================================
// Tests
// =============================================================================
