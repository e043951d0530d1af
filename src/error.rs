//! Error types for itemchain

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    #[error("Node has no local chain yet")]
    NotInitialized,
    #[error("Node is already bootstrapped (state {0})")]
    AlreadyInitialized(String),
    #[error("No usable local network address: {0}")]
    NoLocalAddress(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Decode error: {0}")]
    DecodeError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::DecodeError(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChainError::DecodeError(err.to_string())
        } else {
            ChainError::NetworkError(err.to_string())
        }
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
