//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the observer stream loops and the port interfaces
//! they are driven through.

/// Port interfaces for event sources and client sinks.
pub mod ports;

/// Observer stream loops (raw log, windowed statistics).
pub mod services;
