//! Audit Hub Binary
//!
//! Starts the audited gRPC server and its health endpoint.
//!
//! # Usage
//!
//! ```bash
//! AUDIT_HUB_ACL='{"logger": ["/audit.v1.AdminService/*"]}' cargo run --bin audit-hub
//! ```
//!
//! # Environment Variables
//!
//! ## Required (one of)
//! - `AUDIT_HUB_ACL`: ACL as inline JSON
//! - `AUDIT_HUB_ACL_FILE`: Path to an ACL JSON file
//!
//! ## Optional
//! - `AUDIT_HUB_GRPC_ADDR`: gRPC listen address (default: 127.0.0.1:8082)
//! - `AUDIT_HUB_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `AUDIT_HUB_MAILBOX_CAPACITY`: Per-subscriber queue size (default: 16)
//! - `AUDIT_HUB_DELIVERY_POLICY`: blocking | lossy (default: blocking)
//! - `AUDIT_HUB_OUTBOUND_CAPACITY`: Per-stream send buffer (default: 64)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: audit-hub)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use audit_hub::infrastructure::broadcast::{RegistryConfig, SubscriberRegistry};
use audit_hub::infrastructure::health::{HealthServer, HealthServerState};
use audit_hub::infrastructure::telemetry;
use audit_hub::{AuditService, HubConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP export)
    let telemetry_guard = telemetry::init();

    tracing::info!(
        span_export = telemetry_guard.is_exporting(),
        "Starting Audit Hub"
    );

    let _metrics_handle = init_metrics();

    let config = HubConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let registry = Arc::new(SubscriberRegistry::new(RegistryConfig::from(config.registry)));
    let service = Arc::new(AuditService::new(
        config.acl,
        Arc::clone(&registry),
        config.server.outbound_capacity,
    ));

    if config.server.health_port != 0 {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&registry),
            service.admin(),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    let listener = AuditService::bind(config.server.grpc_addr).await?;
    let grpc_service = Arc::clone(&service);
    let grpc_shutdown = shutdown_token.clone();
    let mut grpc_handle =
        tokio::spawn(async move { grpc_service.serve(listener, grpc_shutdown).await });

    tracing::info!("Audit hub ready");

    tokio::select! {
        () = await_signal() => {}
        result = &mut grpc_handle => {
            shutdown_token.cancel();
            result??;
            return Ok(());
        }
    }

    shutdown_token.cancel();
    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, grpc_handle).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            active_streams = service.admin().active_streams(),
            "Shutdown timed out with observer streams still running"
        ),
    }

    tracing::info!("Audit hub stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &HubConfig) {
    tracing::info!(
        acl = %config.acl_source.describe(),
        consumers = config.acl.len(),
        grpc_addr = %config.server.grpc_addr,
        health_port = config.server.health_port,
        mailbox_capacity = config.registry.mailbox_capacity,
        delivery_policy = config.registry.delivery_policy.as_str(),
        "Configuration loaded"
    );
    for consumer in config.acl.consumers() {
        tracing::debug!(
            consumer,
            patterns = ?config.acl.patterns(consumer).unwrap_or_default(),
            "ACL entry"
        );
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for SIGINT or SIGTERM.
#[allow(clippy::expect_used)]
async fn await_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
