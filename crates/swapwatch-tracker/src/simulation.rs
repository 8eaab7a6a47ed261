//! Synthetic observations for the simulation override.
//!
//! Builds a snapshot from the last known order with a forced status. The
//! result still goes through reconciliation and completion recording, so a
//! simulated completion produces a record flagged `simulated`.

use chrono::Utc;
use serde_json::Value;
use swapwatch_core::{LegSnapshot, Order, OrderSnapshot, OrderStatus, OrderTimes};

use crate::mapper::Observation;

/// Observation that replays `last` with `status` forced.
pub fn synthetic_observation(last: &Order, status: OrderStatus) -> Observation {
    let mut raw = last.raw_api_data.clone();
    if let Value::Object(map) = &mut raw {
        map.insert("status".to_string(), Value::String(status.to_string()));
        map.insert("simulated".to_string(), Value::Bool(true));
    }

    let snapshot = OrderSnapshot {
        order_id: last.order_id.as_str().to_string(),
        order_type: last.order_type,
        raw_status: Value::String(status.to_string()),
        from: LegSnapshot {
            currency: last.from_currency.clone(),
            amount: last.amount,
            address: last.deposit_address.clone(),
            tx: None,
        },
        to: LegSnapshot {
            currency: last.to_currency.clone(),
            amount: last.receive_amount,
            address: last.destination_address.clone(),
            tx: None,
        },
        refund_tx: None,
        emergency: last.emergency.clone(),
        times: OrderTimes::default(),
        raw,
        received_at: Utc::now(),
    };

    Observation::simulated(snapshot, status)
}
