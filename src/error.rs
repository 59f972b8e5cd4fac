//! Error types for identifier actions

use thiserror::Error;

/// Failure raised while executing an identifier action.
///
/// Transport failures never carry an HTTP status: the request died before
/// a response existed. Service and protocol failures always do.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    /// Network-level failure (connect, timeout, reset, body read).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote service answered with a recognizable failure.
    #[error("service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// The response body was not parsable in the expected dialect.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Configuration problem detected while loading bindings and records.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A binding omits a field its service kind requires.
    #[error("binding `{key}`: missing required field `{field}`")]
    MissingField { key: String, field: String },

    /// A binding value is present but unusable.
    #[error("binding `{key}`: {message}")]
    Invalid { key: String, message: String },

    /// A record points at a binding key that was never declared.
    #[error("record `{key}` references unknown binding `{binding}`")]
    UnknownBinding { key: String, binding: String },

    /// The document itself failed to deserialize.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for action operations.
pub type Result<T> = std::result::Result<T, ActionError>;
