//! Error types for the devwatch CLI.
//!
//! CliError wraps CoreError from the shared library and adds CLI-specific variants.

use devwatch_core::error::CoreError;
use thiserror::Error;

pub use devwatch_core::error::{AddressError, ConfigError, StorageError};

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const INVALID_ARGS: i32 = 4;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No devices found")]
    NoDevicesFound,

    #[error("Discovery agent not reachable at {0}")]
    NotConnected(String),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e {
                CoreError::Transport(_) | CoreError::Relay(_) | CoreError::Resolve(_) => {
                    exit_codes::NETWORK_ERROR
                }
                CoreError::Address(_) => exit_codes::INVALID_ARGS,
                CoreError::Storage(_)
                | CoreError::Config(_)
                | CoreError::Io(_)
                | CoreError::Other(_) => exit_codes::GENERAL_ERROR,
            },
            CliError::Io(_) => exit_codes::GENERAL_ERROR,
            CliError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
            CliError::NoDevicesFound => exit_codes::GENERAL_ERROR,
            CliError::NotConnected(_) => exit_codes::NETWORK_ERROR,
            CliError::Other(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        CliError::Core(CoreError::Storage(e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Core(CoreError::Config(e))
    }
}

impl From<AddressError> for CliError {
    fn from(e: AddressError) -> Self {
        CliError::InvalidArgument(e.to_string())
    }
}
