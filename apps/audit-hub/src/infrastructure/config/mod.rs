//! Configuration Module
//!
//! Configuration loading for the audit hub.

mod settings;

pub use settings::{AclSource, ConfigError, HubConfig, RegistrySettings, ServerSettings};
