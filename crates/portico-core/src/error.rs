//! Error types for the portico-core crate

use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building the gateway's immutable state
#[derive(Error, Debug)]
pub enum CoreError {
    /// Route prefix is empty or does not start with '/'
    #[error("invalid route prefix: {0:?}")]
    InvalidPrefix(String),

    /// Route target is not an absolute http(s) URL
    #[error("invalid target for route {prefix}: {reason}")]
    InvalidTarget { prefix: String, reason: String },

    /// Route target in the configuration is not a string
    #[error("route {0} must map to a URL string")]
    NonStringTarget(String),

    /// Configuration is not a JSON object
    #[error("route configuration must be a JSON object of prefix -> URL")]
    NotAnObject,

    /// Same prefix declared twice
    #[error("duplicate route prefix: {0}")]
    DuplicatePrefix(String),

    /// A numeric setting that must be positive was zero
    #[error("{0} must be greater than zero")]
    ZeroSetting(&'static str),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Deserialization(err.to_string())
    }
}
