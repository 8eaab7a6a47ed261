//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signer error: {0}")]
    Signer(#[from] swapwatch_client::SignerError),

    #[error("Upstream error: {0}")]
    Api(#[from] swapwatch_client::ApiError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] swapwatch_tracker::TrackerError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] swapwatch_persistence::PersistenceError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] swapwatch_gateway::GatewayError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] swapwatch_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
