//! Reconciled order state and divergence reports.
//!
//! An [`Order`] is always produced as a fresh value from the previous order
//! and a new snapshot; it is never mutated in place once published.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::decimal::{Amount, Rate};
use crate::order::{OrderId, OrderToken, OrderType};
use crate::snapshot::EmergencyInfo;
use crate::status::OrderStatus;

// ============================================================================
// Order
// ============================================================================

/// One exchange transaction as currently known to the tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: OrderId,
    /// Capability credential. Never serialized.
    #[serde(skip)]
    pub token: OrderToken,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: Option<Amount>,
    pub receive_amount: Option<Amount>,
    pub order_type: OrderType,
    pub deposit_address: String,
    pub destination_address: String,
    pub status: OrderStatus,
    /// Rate implied by the latest observation.
    pub rate: Option<Rate>,
    /// Baseline for drift checks, fixed at first observation.
    pub quoted_rate: Option<Rate>,
    pub emergency: Option<EmergencyInfo>,
    /// Last full upstream payload.
    pub raw_api_data: serde_json::Value,
    pub observed_at: DateTime<Utc>,
    /// Set when this state came from the simulation override.
    pub simulated: bool,
}

impl Order {
    /// Returns true if the order reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ============================================================================
// Divergence
// ============================================================================

/// Mismatch between what we expected and what the upstream now reports.
///
/// Divergences are advisory: they never block status progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// Destination address changed between observations.
    DestinationAddress { expected: String, observed: String },
    /// Float-order rate drifted past the configured threshold.
    Rate {
        quoted: Rate,
        observed: Rate,
        /// Relative drift, e.g. 0.06 for 6%.
        drift: Decimal,
    },
    /// Upstream reported a status behind the one already observed.
    StatusRegression {
        current: OrderStatus,
        reported: OrderStatus,
    },
}

impl Divergence {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DestinationAddress { .. } => "destination_address",
            Self::Rate { .. } => "rate",
            Self::StatusRegression { .. } => "status_regression",
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DestinationAddress { expected, observed } => {
                write!(f, "destination address changed: {expected} -> {observed}")
            }
            Self::Rate {
                quoted,
                observed,
                drift,
            } => write!(
                f,
                "rate drifted {}% (quoted {quoted}, observed {observed})",
                (drift * Decimal::ONE_HUNDRED).round_dp(2)
            ),
            Self::StatusRegression { current, reported } => {
                write!(f, "upstream reported {reported} after {current}")
            }
        }
    }
}
