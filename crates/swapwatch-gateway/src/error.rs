//! Gateway error types.

use axum::http::StatusCode;
use swapwatch_client::ApiError;
use thiserror::Error;

use crate::types::ErrorBody;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Missing order ID or token")]
    MissingCredentials,

    #[error("Upstream returned HTTP {status}")]
    Upstream {
        status: u16,
        reason: String,
        details: String,
    },

    #[error("Failed to parse API response: {0}")]
    InvalidUpstreamBody(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl GatewayError {
    /// HTTP status returned to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MissingCredentials => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Api(ApiError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Api(ApiError::Network(_)) => StatusCode::BAD_GATEWAY,
            Self::InvalidUpstreamBody(_) | Self::Api(_) | Self::Bind { .. } | Self::Serve(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body returned to the caller (without debug info).
    pub fn body(&self) -> ErrorBody {
        let code = self.status_code().as_u16();
        let (msg, details) = match self {
            Self::InvalidRequest(e) => ("Invalid request body".to_string(), Some(e.clone())),
            Self::MissingCredentials => (self.to_string(), None),
            Self::Upstream {
                reason, details, ..
            } => (format!("API Error: {reason}"), Some(details.clone())),
            Self::InvalidUpstreamBody(e) => {
                ("Failed to parse API response".to_string(), Some(e.clone()))
            }
            Self::Api(e) => ("Upstream request failed".to_string(), Some(e.to_string())),
            Self::Bind { .. } | Self::Serve(_) => ("Internal server error".to_string(), None),
        };
        ErrorBody {
            code,
            msg,
            details,
            debug_info: None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_upstream_status_passthrough() {
        let err = GatewayError::Upstream {
            status: 401,
            reason: "Unauthorized".to_string(),
            details: r#"{"code":401}"#.to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let body = err.body();
        assert_eq!(body.code, 401);
        assert_eq!(body.msg, "API Error: Unauthorized");
        assert_eq!(body.details.as_deref(), Some(r#"{"code":401}"#));
    }

    #[test]
    fn test_transport_failures() {
        let timeout = GatewayError::Api(ApiError::Timeout(Duration::from_secs(10)));
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let network = GatewayError::Api(ApiError::Network("connection refused".to_string()));
        assert_eq!(network.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(network.body().code, 502);
    }

    #[test]
    fn test_missing_credentials_body() {
        let body = GatewayError::MissingCredentials.body();
        assert_eq!(body.code, 400);
        assert_eq!(body.msg, "Missing order ID or token");
        assert!(body.details.is_none());
    }
}
