//! Error types for devwatch core.

use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Discovery agent channel errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Channel closed")]
    Closed,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Invalid device report: {0}")]
    InvalidReport(String),
}

/// Relay service errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Relay returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode device list: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RelayError::Decode(e.to_string())
        } else {
            RelayError::Request(e.to_string())
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Config not found: {0}")]
    NotFound(String),
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access storage directory: {0}")]
    DirectoryAccess(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Name resolution failure.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("Host not found: {0}")]
    NotFound(String),

    #[error("Lookup of {host} failed: {message}")]
    Lookup { host: String, message: String },
}

/// Rejected probe address
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid IP address format: {0}")]
    InvalidFormat(String),

    #[error("Link-local address {0} cannot be probed")]
    LinkLocal(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
