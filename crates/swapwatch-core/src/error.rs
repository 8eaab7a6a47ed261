//! Error types for swapwatch-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),

    #[error("Invalid order token: {0}")]
    InvalidToken(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid order status: {0}")]
    InvalidStatus(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
