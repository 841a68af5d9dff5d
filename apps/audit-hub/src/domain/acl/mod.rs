//! Access-Control List
//!
//! Maps a consumer name to the ordered method patterns it may call.
//!
//! # Pattern Syntax
//!
//! - An exact fully-qualified method: `/audit.v1.BizService/Check`
//! - A service wildcard whose last path segment is `*`:
//!   `/audit.v1.BizService/*` matches every method under
//!   `/audit.v1.BizService/`.
//!
//! A consumer absent from the list is denied everything. The list is loaded
//! once at startup and never mutated, so lookups need no synchronization.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// Final path segment that turns a pattern into a wildcard.
pub const WILDCARD: &str = "*";

/// Consumer-to-patterns access list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AccessControlList {
    rules: HashMap<String, Vec<String>>,
}

impl AccessControlList {
    /// Create an empty list (denies every call).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from already-decoded `(consumer, patterns)` pairs.
    #[must_use]
    pub fn from_rules<C, P, I>(rules: impl IntoIterator<Item = (C, I)>) -> Self
    where
        C: Into<String>,
        P: Into<String>,
        I: IntoIterator<Item = P>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|(consumer, patterns)| {
                    (
                        consumer.into(),
                        patterns.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Decode the JSON form `{"consumer": ["/pkg.Svc/Method", ...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`AclError::Malformed`] if the text is not an object of
    /// string arrays.
    pub fn from_json(text: &str) -> Result<Self, AclError> {
        serde_json::from_str(text).map_err(AclError::Malformed)
    }

    /// Read and decode a JSON ACL file.
    ///
    /// # Errors
    ///
    /// Returns [`AclError::Unreadable`] if the file cannot be read, or
    /// [`AclError::Malformed`] if its contents are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AclError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AclError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Check whether `consumer` may call `method`.
    ///
    /// Patterns are tried in order and the first match wins.
    #[must_use]
    pub fn is_allowed(&self, consumer: &str, method: &str) -> bool {
        self.rules
            .get(consumer)
            .is_some_and(|patterns| patterns.iter().any(|p| pattern_matches(p, method)))
    }

    /// Patterns configured for `consumer`, in order.
    #[must_use]
    pub fn patterns(&self, consumer: &str) -> Option<&[String]> {
        self.rules.get(consumer).map(Vec::as_slice)
    }

    /// Iterate over configured consumer names.
    pub fn consumers(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Number of configured consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check whether no consumer is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Match one pattern against a fully-qualified method name.
#[must_use]
pub fn pattern_matches(pattern: &str, method: &str) -> bool {
    if pattern == method {
        return true;
    }
    let last = pattern.rsplit_once('/').map_or(pattern, |(_, last)| last);
    if last != WILDCARD {
        return false;
    }
    // "/svc/*" keeps its trailing slash, so "/svc2/..." stays out of scope.
    pattern
        .strip_suffix(WILDCARD)
        .is_some_and(|scope| method.starts_with(scope))
}

/// ACL loading errors.
#[derive(Debug, thiserror::Error)]
pub enum AclError {
    /// ACL text is not a JSON object of string arrays.
    #[error("malformed ACL: {0}")]
    Malformed(#[source] serde_json::Error),
    /// ACL file could not be read.
    #[error("cannot read ACL file {path}: {source}")]
    Unreadable {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Tests
// =============================================================================
