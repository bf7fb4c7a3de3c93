//! # Error Types
//!
//! Custom error types for Pad Bridge using `thiserror`.

use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for Pad Bridge
#[derive(Debug, Error)]
pub enum PadBridgeError {
    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but a value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The UDP socket could not be created or bound
    #[error("Failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Every backend candidate failed to start, including a single
    /// explicitly requested one
    #[error("No input backend could be started:\n{0}")]
    NoBackend(String),

    /// Logging could not be initialised
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Result type alias for Pad Bridge
pub type Result<T> = std::result::Result<T, PadBridgeError>;
