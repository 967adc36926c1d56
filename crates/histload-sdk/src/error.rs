//! Structured error model for collaborator operations.
//!
//! [`ConnectorError`] carries a classification, a stable code, and a
//! human-readable message. Construct via the category-specific factory
//! methods so every connector reports failures the same way.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a collaborator error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid connector configuration.
    Config,
    /// Authentication failure.
    Auth,
    /// Network failure talking to a remote system.
    TransientNetwork,
    /// Database reported an error while executing a statement.
    TransientDb,
    /// Catalog metadata is missing or unusable.
    Schema,
    /// A value could not be decoded or encoded.
    Data,
    /// Object storage failure.
    Storage,
    /// Internal connector error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::TransientNetwork => "transient_network",
            Self::TransientDb => "transient_db",
            Self::Schema => "schema",
            Self::Data => "data",
            Self::Storage => "storage",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Structured error from a source, warehouse, or object store operation.
///
/// Nothing in histload retries, so unlike a retrying engine this carries no
/// backoff metadata: the category and code exist for operators reading the
/// failure log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct ConnectorError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
}

impl ConnectorError {
    fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Configuration error.
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, code, message)
    }

    /// Authentication error.
    #[must_use]
    pub fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Auth, code, message)
    }

    /// Network error (connect, TLS, dropped connection).
    #[must_use]
    pub fn transient_network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::TransientNetwork, code, message)
    }

    /// Database error raised by a statement.
    #[must_use]
    pub fn transient_db(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::TransientDb, code, message)
    }

    /// Catalog metadata error.
    #[must_use]
    pub fn schema(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Schema, code, message)
    }

    /// Value decode/encode error.
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, code, message)
    }

    /// Object storage error.
    #[must_use]
    pub fn storage(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Storage, code, message)
    }

    /// Internal connector error.
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }
}
