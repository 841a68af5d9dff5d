//! Stream sink backed by a tonic server-streaming response.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tonic::Status;

use crate::application::ports::{SinkClosed, StreamSink};

/// Converts domain items into wire messages and feeds a response stream.
#[derive(Debug)]
pub struct GrpcSink<P> {
    tx: mpsc::Sender<Result<P, Status>>,
}

impl<P> GrpcSink<P> {
    /// Wrap the sending half of a response channel.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<Result<P, Status>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl<T, P> StreamSink<T> for GrpcSink<P>
where
    T: Send + 'static,
    P: From<T> + Send + 'static,
{
    async fn send(&self, item: T) -> Result<(), SinkClosed> {
        self.tx.send(Ok(P::from(item))).await.map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        self.tx.closed().await;
    }
}
