//! Port Interfaces
//!
//! Defines the interfaces (ports) the observer loops are written against.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StreamSink`: Where a loop writes its output (a server-side stream)
//!
//! ## Driver Ports (Inbound)
//!
//! - `EventSource`: Where a loop reads audit events from (a mailbox)

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::audit::Event;

/// The remote end of a stream is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream sink closed")]
pub struct SinkClosed;

/// Ordered source of audit events for one observer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the source is closed and drained.
    async fn recv(&mut self) -> Option<Arc<Event>>;
}

/// Output side of an observer stream.
#[async_trait]
pub trait StreamSink<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Send one item to the remote end.
    ///
    /// # Errors
    ///
    /// Returns [`SinkClosed`] if the remote end has disconnected.
    async fn send(&self, item: T) -> Result<(), SinkClosed>;

    /// Resolve once the remote end has disconnected.
    async fn closed(&self);
}

#[async_trait]
impl EventSource for mpsc::Receiver<Arc<Event>> {
    async fn recv(&mut self) -> Option<Arc<Event>> {
        mpsc::Receiver::recv(self).await
    }
}

#[async_trait]
impl<T> StreamSink<T> for mpsc::Sender<T>
where
    T: Send + 'static,
{
    async fn send(&self, item: T) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, item).await.map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await;
    }
}
