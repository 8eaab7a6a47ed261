//! Emergency actions offered to the user.
//!
//! When an order stalls in an emergency (short/late payment, rate moved) the
//! upstream lets the user either continue the exchange at the current rate
//! or take a refund. Actions here are advisory only.

use serde::Serialize;
use swapwatch_core::{Divergence, EmergencyChoice, Order, OrderStatus};

/// User-facing action for an order in emergency state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyAction {
    /// Continue the exchange at the current rate.
    Exchange,
    /// Return the deposit to the sender.
    Refund,
}

/// Actions available for `order` given the divergences of its latest
/// reconciliation.
pub fn available_actions(order: &Order, divergences: &[Divergence]) -> Vec<EmergencyAction> {
    if order.is_terminal() {
        return Vec::new();
    }

    let awaiting_choice = order.status == OrderStatus::Error
        && order
            .emergency
            .as_ref()
            .is_some_and(|e| e.choice == EmergencyChoice::None);

    let mismatch = divergences.iter().any(|d| {
        matches!(
            d,
            Divergence::Rate { .. } | Divergence::DestinationAddress { .. }
        )
    });

    if awaiting_choice || mismatch {
        vec![EmergencyAction::Exchange, EmergencyAction::Refund]
    } else {
        Vec::new()
    }
}
