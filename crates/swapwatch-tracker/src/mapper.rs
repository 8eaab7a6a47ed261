//! Upstream status vocabulary to internal [`OrderStatus`].
//!
//! The only place that interprets the raw upstream status field. The mapping
//! is total: anything unrecognised becomes `OrderStatus::Error` and is logged,
//! never propagated.

use std::fmt;

use serde_json::Value;
use swapwatch_core::{EmergencyChoice, OrderSnapshot, OrderStatus};
use tracing::warn;

/// Snapshot paired with its mapped status.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub snapshot: OrderSnapshot,
    pub status: OrderStatus,
    /// Produced by the simulation override rather than the upstream.
    pub simulated: bool,
}

impl Observation {
    /// Map an upstream snapshot.
    pub fn from_upstream(snapshot: OrderSnapshot) -> Self {
        let status = map_status(&snapshot);
        Self {
            snapshot,
            status,
            simulated: false,
        }
    }

    /// Observation with a forced status.
    pub fn simulated(snapshot: OrderSnapshot, status: OrderStatus) -> Self {
        Self {
            snapshot,
            status,
            simulated: true,
        }
    }
}

/// Raw status value that has no internal counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnmappedStatusError {
    raw: String,
}

impl fmt::Display for UnmappedStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unmapped upstream status: {}", self.raw)
    }
}

/// Map the snapshot's raw status. Never fails.
pub fn map_status(snapshot: &OrderSnapshot) -> OrderStatus {
    match try_map(snapshot) {
        Ok(status) => status,
        Err(e) => {
            warn!(upstream_id = %snapshot.order_id, error = %e, "Treating status as ERROR");
            OrderStatus::Error
        }
    }
}

pub(crate) fn try_map(snapshot: &OrderSnapshot) -> Result<OrderStatus, UnmappedStatusError> {
    let unmapped = || UnmappedStatusError {
        raw: snapshot.raw_status.to_string(),
    };
    let token = normalize(&snapshot.raw_status).ok_or_else(unmapped)?;

    let status = match token.as_str() {
        "NEW" | "WAIT" | "AWAITING_DEPOSIT" | "0" => OrderStatus::AwaitingDeposit,
        "PENDING" | "CONFIRMING" | "1" => OrderStatus::Confirming,
        "EXCHANGE" | "EXCHANGING" | "2" => OrderStatus::Exchanging,
        "WITHDRAW" | "SENDING" | "3" => OrderStatus::Sending,
        "DONE" | "COMPLETED" | "SUCCESS" | "4" => OrderStatus::Completed,
        "EXPIRED" | "5" => OrderStatus::Expired,
        "REFUNDED" => OrderStatus::Refunded,
        "EMERGENCY" | "6" => emergency_outcome(snapshot),
        "ERROR" | "FAILED" => OrderStatus::Error,
        _ => return Err(unmapped()),
    };
    Ok(status)
}

/// Upper-cased word or canonical decimal code.
fn normalize(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<u64>() {
                Ok(code) => Some(code.to_string()),
                Err(_) => Some(trimmed.to_ascii_uppercase()),
            }
        }
        Value::Number(n) => n.as_u64().map(|code| code.to_string()),
        _ => None,
    }
}

/// An emergency resolves to a refund only once the user chose it and the
/// refund transaction exists.
fn emergency_outcome(snapshot: &OrderSnapshot) -> OrderStatus {
    let refund_chosen = snapshot
        .emergency
        .as_ref()
        .is_some_and(|e| e.choice == EmergencyChoice::Refund);
    let refund_sent = snapshot
        .refund_tx
        .as_ref()
        .is_some_and(|tx| tx.is_broadcast());

    if refund_chosen && refund_sent {
        OrderStatus::Refunded
    } else {
        OrderStatus::Error
    }
}
