//! Polling session state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use swapwatch_core::Order;

/// Scheduler lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Created, loop not started.
    #[default]
    Idle,
    /// Loop running.
    Polling,
    /// Loop finished (terminal status, fatal error, stop or cancel).
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Polling => write!(f, "polling"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Per-order polling bookkeeping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollingSession {
    /// Consecutive failed cycles; reset by a successful one.
    pub attempt_count: u32,
    /// Cycles run, successful or not.
    pub cycle_count: u64,
    pub last_error: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub is_polling: bool,
    /// Last reconciled order.
    pub last_order: Option<Order>,
}

impl PollingSession {
    pub(crate) fn record_success(&mut self, order: Order, at: DateTime<Utc>) {
        self.cycle_count += 1;
        self.attempt_count = 0;
        self.last_error = None;
        self.last_checked_at = Some(at);
        self.last_order = Some(order);
    }

    pub(crate) fn record_failure(&mut self, error: &str, at: DateTime<Utc>) {
        self.cycle_count += 1;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_error = Some(error.to_string());
        self.last_checked_at = Some(at);
    }
}
