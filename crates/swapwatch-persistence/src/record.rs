//! Completion record written once per finished order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swapwatch_core::{Amount, Order, OrderStatus, OrderType};
use uuid::Uuid;

/// Persisted summary of an order that reached a terminal status.
///
/// Has no token field: the capability credential is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub record_id: Uuid,
    pub order_id: String,
    pub status: OrderStatus,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: Option<Amount>,
    pub receive_amount: Option<Amount>,
    pub order_type: OrderType,
    pub deposit_address: String,
    pub destination_address: String,
    pub simulated: bool,
    pub recorded_at: DateTime<Utc>,
    pub raw_api_data: serde_json::Value,
}

impl CompletionRecord {
    /// Build a record from a reconciled order.
    pub fn from_order(order: &Order) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            order_id: order.order_id.as_str().to_string(),
            status: order.status,
            from_currency: order.from_currency.clone(),
            to_currency: order.to_currency.clone(),
            amount: order.amount,
            receive_amount: order.receive_amount,
            order_type: order.order_type,
            deposit_address: order.deposit_address.clone(),
            destination_address: order.destination_address.clone(),
            simulated: order.simulated,
            recorded_at: Utc::now(),
            raw_api_data: order.raw_api_data.clone(),
        }
    }
}
