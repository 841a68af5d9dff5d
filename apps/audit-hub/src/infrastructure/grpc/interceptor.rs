//! Audit Interceptor
//!
//! A tower layer in front of every gRPC route. For each call it builds an
//! audit [`Event`], broadcasts it to all observers, and only then consults
//! the ACL. Denied calls are still audited.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Request, Response};
use tonic::Status;
use tonic::transport::server::TcpConnectInfo;
use tower::{Layer, Service};

use crate::domain::acl::AccessControlList;
use crate::domain::audit::Event;
use crate::infrastructure::broadcast::SharedRegistry;
use crate::infrastructure::metrics;

/// Metadata key carrying the caller identity.
pub const CONSUMER_METADATA_KEY: &str = "consumer";

/// Layer that wraps a service in [`AuditMiddleware`].
#[derive(Debug, Clone)]
pub struct AuditLayer {
    acl: Arc<AccessControlList>,
    registry: SharedRegistry,
}

impl AuditLayer {
    /// Create a new audit layer.
    #[must_use]
    pub const fn new(acl: Arc<AccessControlList>, registry: SharedRegistry) -> Self {
        Self { acl, registry }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditMiddleware {
            inner,
            acl: Arc::clone(&self.acl),
            registry: Arc::clone(&self.registry),
        }
    }
}

/// Audits then authorizes each request before handing it to `inner`.
#[derive(Debug, Clone)]
pub struct AuditMiddleware<S> {
    inner: S,
    acl: Arc<AccessControlList>,
    registry: SharedRegistry,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AuditMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Take the service that was polled ready and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let acl = Arc::clone(&self.acl);
        let registry = Arc::clone(&self.registry);

        Box::pin(async move {
            let event = Arc::new(audit_event(&req));
            let allowed = acl.is_allowed(&event.consumer, &event.method);

            let report = registry.broadcast(Arc::clone(&event)).await;
            metrics::record_call(allowed);
            tracing::trace!(
                consumer = %event.consumer,
                method = %event.method,
                delivered = report.delivered,
                "Call audited"
            );

            if !allowed {
                tracing::warn!(
                    consumer = %event.consumer,
                    method = %event.method,
                    host = %event.host,
                    "Access denied"
                );
                return Ok(Status::unauthenticated("access denied").into_http());
            }

            inner.call(req).await
        })
    }
}

/// Build the audit record for one request.
pub fn audit_event<B>(req: &Request<B>) -> Event {
    let consumer: String = req
        .headers()
        .get_all(CONSUMER_METADATA_KEY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let host = req
        .extensions()
        .get::<TcpConnectInfo>()
        .and_then(TcpConnectInfo::remote_addr)
        .map(|addr: SocketAddr| addr.to_string())
        .unwrap_or_default();

    Event::now(consumer, req.uri().path(), host)
}
