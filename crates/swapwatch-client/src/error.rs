//! Upstream client error types.

use std::time::Duration;

use swapwatch_core::CoreError;
use thiserror::Error;

/// Classification of an application-level (`code != 0`) error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationErrorKind {
    /// Bad API key or signature.
    Authentication,
    /// The order id/token pair does not resolve to an order.
    OrderNotFound,
    /// Anything else; the order may still resolve on a later request.
    Other,
}

impl ApplicationErrorKind {
    /// Classify an envelope error by code and message.
    pub fn classify(code: i64, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if matches!(code, 401 | 403)
            || lower.contains("unauthorized")
            || lower.contains("authentication")
            || lower.contains("invalid signature")
            || lower.contains("api key")
        {
            Self::Authentication
        } else if code == 404 || lower.contains("not found") {
            Self::OrderNotFound
        } else {
            Self::Other
        }
    }
}

/// Errors surfaced by the upstream client.
///
/// Transport failures are converted here and never escape as raw
/// `reqwest` errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Upstream server error: HTTP {status}")]
    Server { status: u16, body: String },

    #[error("Upstream HTTP error: HTTP {status}")]
    Http { status: u16, body: String },

    #[error("Application error {code}: {message}")]
    Application {
        code: i64,
        message: String,
        kind: ApplicationErrorKind,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    /// Network-level failures worth another attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Server { .. } | Self::RetriesExhausted { .. }
        )
    }

    /// Errors that end a polling session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::Validation(_) => true,
            Self::Http { status, .. } => matches!(status, 401 | 403 | 404),
            Self::Application { kind, .. } => !matches!(kind, ApplicationErrorKind::Other),
            _ => false,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Server { .. } => "server",
            Self::Http { .. } => "http",
            Self::Application { .. } => "application",
            Self::InvalidResponse(_) => "invalid_response",
            Self::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Signing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("Signing secret is empty")]
    EmptySecret,

    #[error("Secret source unavailable: {0}")]
    SecretUnavailable(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Body serialization failed: {0}")]
    SerializationFailed(String),
}

impl From<SignerError> for ApiError {
    fn from(e: SignerError) -> Self {
        Self::Configuration(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
pub type SignerResult<T> = Result<T, SignerError>;
