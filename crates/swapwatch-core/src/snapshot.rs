//! Normalized view of one upstream order-status response.
//!
//! The upstream payload is loosely typed; the client lifts the fields it
//! understands into these structs and keeps the untouched status field and
//! the full payload for the status mapper and for debugging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Amount, Rate};
use crate::order::OrderType;

/// On-chain transaction attached to one leg of the swap.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxSnapshot {
    /// Transaction hash (empty until broadcast).
    pub id: String,
    pub amount: Option<Amount>,
    pub confirmations: Option<u32>,
}

impl TxSnapshot {
    /// True once the upstream reported a transaction hash.
    pub fn is_broadcast(&self) -> bool {
        !self.id.is_empty()
    }
}

/// One side of the swap (what the user sends or receives).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegSnapshot {
    /// Currency symbol (e.g. "BTC", "USDTTRC").
    pub currency: String,
    pub amount: Option<Amount>,
    /// Deposit address for the send leg, destination address for the receive leg.
    pub address: String,
    pub tx: Option<TxSnapshot>,
}

/// What the user chose to do with an order in emergency state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyChoice {
    /// No decision yet.
    #[default]
    None,
    /// Continue the exchange at the current rate.
    Exchange,
    /// Return the deposit.
    Refund,
}

impl EmergencyChoice {
    /// Parse the upstream `emergency.choice` field.
    pub fn from_upstream(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "EXCHANGE" => Self::Exchange,
            "REFUND" => Self::Refund,
            _ => Self::None,
        }
    }
}

/// Emergency block reported by the upstream (late/short/over payment, rate limit).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmergencyInfo {
    /// Raw reasons, e.g. `["EXPIRED", "LESS"]`.
    pub reasons: Vec<String>,
    pub choice: EmergencyChoice,
}

/// Order timestamps reported by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTimes {
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Fresh order state as returned by one successful status request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Order id as echoed by the upstream (may be empty).
    pub order_id: String,
    pub order_type: OrderType,
    /// Untouched upstream status field (number, string, or missing).
    ///
    /// Only the status mapper interprets this value.
    pub raw_status: serde_json::Value,
    pub from: LegSnapshot,
    pub to: LegSnapshot,
    /// Refund transaction (`back.tx`), if any.
    pub refund_tx: Option<TxSnapshot>,
    pub emergency: Option<EmergencyInfo>,
    pub times: OrderTimes,
    /// Full `data` payload of the response.
    pub raw: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl OrderSnapshot {
    /// Current rate implied by the two legs.
    pub fn rate(&self) -> Option<Rate> {
        let sent = self.from.amount?;
        let received = self.to.amount?;
        sent.rate_to(received)
    }

    /// Destination address of the receive leg.
    pub fn destination_address(&self) -> &str {
        &self.to.address
    }

    /// Deposit address of the send leg.
    pub fn deposit_address(&self) -> &str {
        &self.from.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leg(currency: &str, amount: Option<Amount>) -> LegSnapshot {
        LegSnapshot {
            currency: currency.to_string(),
            amount,
            address: String::new(),
            tx: None,
        }
    }

    #[test]
    fn test_snapshot_rate() {
        let snapshot = OrderSnapshot {
            order_id: "X1".to_string(),
            order_type: OrderType::Float,
            raw_status: serde_json::json!("NEW"),
            from: leg("BTC", Some(Amount::new(dec!(0.1)))),
            to: leg("ETH", Some(Amount::new(dec!(1.6)))),
            refund_tx: None,
            emergency: None,
            times: OrderTimes::default(),
            raw: serde_json::Value::Null,
            received_at: Utc::now(),
        };
        assert_eq!(snapshot.rate(), Some(Rate::new(dec!(16))));

        let missing = OrderSnapshot {
            to: leg("ETH", None),
            ..snapshot
        };
        assert_eq!(missing.rate(), None);
    }

    #[test]
    fn test_emergency_choice_parse() {
        assert_eq!(EmergencyChoice::from_upstream("refund"), EmergencyChoice::Refund);
        assert_eq!(EmergencyChoice::from_upstream("EXCHANGE"), EmergencyChoice::Exchange);
        assert_eq!(EmergencyChoice::from_upstream("NONE"), EmergencyChoice::None);
        assert_eq!(EmergencyChoice::from_upstream(""), EmergencyChoice::None);
    }
}
