//! Tracker error types.

use swapwatch_client::ApiError;
use swapwatch_core::CoreError;
use swapwatch_persistence::PersistenceError;
use thiserror::Error;

use crate::session::Phase;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Validation error: {0}")]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Cannot start from phase {0}")]
    InvalidPhase(Phase),

    #[error("Simulation is disabled")]
    SimulationDisabled,

    #[error("No observed order to simulate from")]
    NoObservation,
}

impl TrackerError {
    /// Errors that end a polling session.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Api(e) => e.is_fatal(),
            _ => false,
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
