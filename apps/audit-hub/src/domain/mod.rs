//! Domain Layer - Core audit types and access rules.
//!
//! This layer holds the audit records and the ACL matcher. Nothing here
//! touches the transport or the runtime.

/// Audit events and windowed call statistics.
pub mod audit;

/// Consumer access-control list.
pub mod acl;
