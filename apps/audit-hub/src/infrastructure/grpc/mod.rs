//! gRPC Server
//!
//! Exposes the business and admin services behind the audit interceptor.
//!
//! # Architecture
//!
//! Every call, unary or streaming, passes through [`AuditLayer`] first:
//!
//! 1. An audit event is built from the call metadata
//! 2. The event is broadcast to every registered observer
//! 3. The caller is checked against the ACL and rejected if not allowed
//!
//! Admin streams register a subscriber, run an observer loop on a tracked
//! task, and deregister when the loop returns.

pub mod interceptor;
pub mod server;
pub mod service;
pub mod sink;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod audit {
        pub mod v1 {
            include!(concat!(env!("OUT_DIR"), "/audit.v1.rs"));
        }
    }
}

pub use interceptor::{AuditLayer, AuditMiddleware, CONSUMER_METADATA_KEY};
pub use server::{AdminServer, BizServer, MAX_STAT_INTERVAL_SECS};
pub use service::{AuditService, ServeError};
pub use sink::GrpcSink;
