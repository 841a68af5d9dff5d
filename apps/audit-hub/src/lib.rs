#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Audit Hub - Call Audit Broadcaster
//!
//! A gRPC server that audits every incoming call, fans the audit event out
//! to any number of streaming observers, and enforces a per-consumer ACL.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `audit`: Audit events and statistics windows
//!   - `acl`: Consumer-to-method access list
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Event sources and stream sinks
//!   - `services`: Log and statistics observer loops
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: Subscriber registry and fan-out
//!   - `grpc`: Services, audit interceptor, and server composition
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!              ┌─────────────┐   broadcast   ┌──────────────┐
//! Call ───────►│ AuditLayer  │──────────────►│  Subscriber  │──► Logging 1
//!              │ (audit, ACL)│               │   Registry   │──► Logging N
//!              └──────┬──────┘               └──────────────┘──► Statistics
//!                     │ allowed
//!                     ▼
//!              BizService / AdminService
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core audit types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::acl::{AccessControlList, AclError};
pub use domain::audit::{Event, Stat, StatWindow};

// Application
pub use application::ports::{EventSource, SinkClosed, StreamSink};
pub use application::services::{StreamExit, run_log_stream, run_stats_stream};

// Infrastructure config
pub use infrastructure::config::{AclSource, ConfigError, HubConfig, RegistrySettings, ServerSettings};

// Subscriber registry
pub use infrastructure::broadcast::{
    DeliveryPolicy, DeliveryReport, Mailbox, RegistryConfig, RegistryStats, SharedRegistry,
    SubscriberId, SubscriberRegistry,
};

// gRPC server (for integration tests)
pub use infrastructure::grpc::{
    AdminServer, AuditLayer, AuditService, BizServer, CONSUMER_METADATA_KEY, ServeError,
    proto::audit::v1 as proto,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
