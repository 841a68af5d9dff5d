//! Shared helpers for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::Streaming;
use tonic::transport::Channel;

use audit_hub::{
    AccessControlList, AuditService, CONSUMER_METADATA_KEY, ServeError, SharedRegistry,
    SubscriberRegistry,
    proto::{
        Event, admin_service_client::AdminServiceClient, biz_service_client::BizServiceClient,
    },
};

pub const CHECK: &str = "/audit.v1.BizService/Check";
pub const ADD: &str = "/audit.v1.BizService/Add";
pub const TEST: &str = "/audit.v1.BizService/Test";

pub const WAIT: Duration = Duration::from_secs(5);

pub const ACL: &str = r#"{
    "logger": ["/audit.v1.AdminService/Logging"],
    "stats": ["/audit.v1.AdminService/Statistics"],
    "biz": ["/audit.v1.BizService/Check", "/audit.v1.BizService/Add"],
    "admin": ["/audit.v1.AdminService/*"]
}"#;

/// Running audit hub on an ephemeral port.
pub struct TestHub {
    pub addr: SocketAddr,
    pub registry: SharedRegistry,
    pub service: Arc<AuditService>,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<Result<(), ServeError>>,
}

impl TestHub {
    pub async fn start() -> Self {
        let acl = AccessControlList::from_json(ACL).unwrap();
        let registry = Arc::new(SubscriberRegistry::with_defaults());
        let service = Arc::new(AuditService::new(acl, Arc::clone(&registry), 16));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let serving = Arc::clone(&service);
        let token = shutdown.clone();
        let handle = tokio::spawn(async move { serving.serve(listener, token).await });

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            registry,
            service,
            shutdown,
            handle,
        }
    }

    pub async fn biz(&self) -> BizServiceClient<Channel> {
        BizServiceClient::connect(format!("http://{}", self.addr))
            .await
            .unwrap()
    }

    pub async fn admin(&self) -> AdminServiceClient<Channel> {
        AdminServiceClient::connect(format!("http://{}", self.addr))
            .await
            .unwrap()
    }

    /// Poll until the registry holds exactly `count` subscribers.
    pub async fn wait_for_subscribers(&self, count: usize) {
        timeout(WAIT, async {
            while self.registry.subscriber_count().await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscriber count never settled");
    }
}

/// Wrap `message` with the `consumer` metadata key.
pub fn as_consumer<T>(message: T, consumer: &str) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert(CONSUMER_METADATA_KEY, consumer.parse().unwrap());
    request
}

/// Next `count` events on `stream` made by `consumer`, skipping others.
pub async fn next_events_from(
    stream: &mut Streaming<Event>,
    consumer: &str,
    count: usize,
) -> Vec<Event> {
    let mut events = Vec::with_capacity(count);
    while events.len() < count {
        let event = timeout(WAIT, stream.message())
            .await
            .expect("timed out waiting for event")
            .unwrap()
            .expect("log stream ended early");
        if event.consumer == consumer {
            events.push(event);
        }
    }
    events
}
