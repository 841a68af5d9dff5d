//! Audit Hub Configuration Settings
//!
//! Configuration types for the audit hub, loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::domain::acl::{AccessControlList, AclError};
use crate::infrastructure::broadcast::DeliveryPolicy;

/// Inline ACL document.
pub const ENV_ACL: &str = "AUDIT_HUB_ACL";
/// Path to an ACL document.
pub const ENV_ACL_FILE: &str = "AUDIT_HUB_ACL_FILE";

/// Where the ACL document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclSource {
    /// JSON text given directly.
    Inline(String),
    /// JSON file on disk.
    File(PathBuf),
}

impl AclSource {
    /// Resolve the source from the environment.
    ///
    /// The inline form wins when both are set.
    ///
    /// # Errors
    ///
    /// Returns an error if neither variable is set or the chosen one is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(inline) = std::env::var(ENV_ACL) {
            if inline.trim().is_empty() {
                return Err(ConfigError::EmptyValue(ENV_ACL.to_string()));
            }
            return Ok(Self::Inline(inline));
        }

        match std::env::var(ENV_ACL_FILE) {
            Ok(path) if path.trim().is_empty() => {
                Err(ConfigError::EmptyValue(ENV_ACL_FILE.to_string()))
            }
            Ok(path) => Ok(Self::File(PathBuf::from(path))),
            Err(_) => Err(ConfigError::MissingEnvVar(format!(
                "{ENV_ACL} or {ENV_ACL_FILE}"
            ))),
        }
    }

    /// Parse the ACL this source points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the JSON is malformed.
    pub fn load(&self) -> Result<AccessControlList, AclError> {
        match self {
            Self::Inline(json) => AccessControlList::from_json(json),
            Self::File(path) => AccessControlList::from_file(path),
        }
    }

    /// Short description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Inline(_) => "inline".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Subscriber registry settings.
#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    /// Per-subscriber mailbox capacity.
    pub mailbox_capacity: usize,
    /// Behaviour when a mailbox is full.
    pub delivery_policy: DeliveryPolicy,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 16,
            delivery_policy: DeliveryPolicy::Blocking,
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// gRPC listen address.
    pub grpc_addr: SocketAddr,
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
    /// Per-stream buffer between an observer loop and the transport.
    pub outbound_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            grpc_addr: SocketAddr::from(([127, 0, 0, 1], 8082)),
            health_port: 8083,
            outbound_capacity: 64,
        }
    }
}

/// Complete audit hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Where the ACL was loaded from.
    pub acl_source: AclSource,
    /// Parsed ACL.
    pub acl: AccessControlList,
    /// Listener settings.
    pub server: ServerSettings,
    /// Subscriber registry settings.
    pub registry: RegistrySettings,
}

impl HubConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if no ACL is configured, the ACL cannot be parsed,
    /// or the gRPC address is not a valid socket address.
    pub fn from_env() -> Result<Self, ConfigError> {
        let acl_source = AclSource::from_env()?;
        let acl = acl_source.load()?;

        let grpc_addr = match std::env::var("AUDIT_HUB_GRPC_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "AUDIT_HUB_GRPC_ADDR".to_string(),
                    value: raw,
                })?,
            Err(_) => ServerSettings::default().grpc_addr,
        };

        let server = ServerSettings {
            grpc_addr,
            health_port: parse_env_u16(
                "AUDIT_HUB_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
            outbound_capacity: parse_env_usize(
                "AUDIT_HUB_OUTBOUND_CAPACITY",
                ServerSettings::default().outbound_capacity,
            )
            .max(1),
        };

        let registry = RegistrySettings {
            mailbox_capacity: parse_env_usize(
                "AUDIT_HUB_MAILBOX_CAPACITY",
                RegistrySettings::default().mailbox_capacity,
            )
            .max(1),
            delivery_policy: std::env::var("AUDIT_HUB_DELIVERY_POLICY")
                .map(|s| DeliveryPolicy::from_str_case_insensitive(&s))
                .unwrap_or_default(),
        };

        Ok(Self {
            acl_source,
            acl,
            server,
            registry,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
    /// ACL document could not be loaded.
    #[error(transparent)]
    Acl(#[from] AclError),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
