//! Service Composition
//!
//! Wires the ACL, subscriber registry, and both gRPC services behind the
//! audit layer, and runs them on a listener until cancelled.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use super::interceptor::AuditLayer;
use super::proto::audit::v1::{
    admin_service_server::AdminServiceServer, biz_service_server::BizServiceServer,
};
use super::server::{AdminServer, BizServer};
use crate::domain::acl::AccessControlList;
use crate::infrastructure::broadcast::SharedRegistry;

/// Audited gRPC endpoint.
#[derive(Debug)]
pub struct AuditService {
    acl: Arc<AccessControlList>,
    registry: SharedRegistry,
    admin: Arc<AdminServer>,
}

impl AuditService {
    /// Create a new service over `registry`.
    #[must_use]
    pub fn new(acl: AccessControlList, registry: SharedRegistry, outbound_capacity: usize) -> Self {
        let admin = Arc::new(AdminServer::new(Arc::clone(&registry), outbound_capacity));
        Self {
            acl: Arc::new(acl),
            registry,
            admin,
        }
    }

    /// Shared subscriber registry.
    #[must_use]
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Admin service handle.
    #[must_use]
    pub fn admin(&self) -> Arc<AdminServer> {
        Arc::clone(&self.admin)
    }

    /// Bind a listener for [`serve`](Self::serve).
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Bind`] if the address is unavailable.
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServeError> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })
    }

    /// Serve both services on `listener` until `shutdown` is cancelled.
    ///
    /// On cancellation the listener stops accepting first. Only then is every
    /// observer stream closed and awaited, and the call returns once open
    /// connections have drained.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Transport`] if the server fails.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServeError> {
        let local_addr = listener.local_addr().ok();
        let admin = Arc::clone(&self.admin);
        let (stopped_tx, stopped_rx) = oneshot::channel::<()>();

        // Resolving this ends tonic's accept loop.
        let signal = async move {
            shutdown.cancelled().await;
            tracing::info!("gRPC server shutting down");
            let _ = stopped_tx.send(());
        };

        // Closed sender means the server exited on its own.
        let drain = async move {
            let _ = stopped_rx.await;
            admin.shutdown().await;
        };

        tracing::info!(addr = ?local_addr, "gRPC server listening");

        let serving = Server::builder()
            .layer(AuditLayer::new(Arc::clone(&self.acl), Arc::clone(&self.registry)))
            .add_service(BizServiceServer::new(BizServer))
            .add_service(AdminServiceServer::from_arc(Arc::clone(&self.admin)))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal);

        let (result, ()) = tokio::join!(serving, drain);
        result?;

        tracing::info!("gRPC server stopped");
        Ok(())
    }
}

/// gRPC server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Failed to bind the listen address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Transport failure while serving.
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
