//! Order tracking for swapwatch.
//!
//! - `mapper`: upstream status vocabulary to `OrderStatus`
//! - `reconciler`: pure merge of a fresh observation into the known order
//! - `emergency`: actions offered to the user for a problematic order
//! - `scheduler`: per-order polling loop with cancellation and events
//! - `simulation`: forced-status override for testing flows

pub mod emergency;
pub mod error;
pub mod mapper;
pub mod reconciler;
pub mod scheduler;
pub mod session;
pub mod simulation;

pub use emergency::{available_actions, EmergencyAction};
pub use error::{TrackerError, TrackerResult};
pub use mapper::{map_status, Observation};
pub use reconciler::{default_rate_threshold, reconcile, ReconcileContext, Reconciliation};
pub use scheduler::{
    CycleReport, OrderTarget, PollEvent, PollingConfig, PollingScheduler, StopReason, Trigger,
};
pub use session::{Phase, PollingSession};
pub use simulation::synthetic_observation;
