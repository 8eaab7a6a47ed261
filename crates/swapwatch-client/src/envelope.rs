//! Response envelope parsing.
//!
//! The upstream wraps every response in `{code, msg, data}`. The order
//! payload inside `data` is read leniently: numbers may arrive as strings
//! and most fields may be missing.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swapwatch_core::{
    Amount, EmergencyChoice, EmergencyInfo, LegSnapshot, OrderSnapshot, OrderTimes, OrderType,
    TxSnapshot,
};
use tracing::debug;

use crate::error::{ApiError, ApiResult, ApplicationErrorKind};

/// Upstream response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiEnvelope {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Convert a non-zero code into a classified application error.
    pub fn application_error(&self) -> ApiError {
        let message = self.msg.clone().unwrap_or_default();
        ApiError::Application {
            code: self.code,
            kind: ApplicationErrorKind::classify(self.code, &message),
            message,
        }
    }
}

/// Parse a 2xx response body into an order snapshot.
pub fn parse_order_response(body: &str) -> ApiResult<OrderSnapshot> {
    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|e| ApiError::InvalidResponse(format!("malformed envelope: {e}")))?;

    if !envelope.is_success() {
        return Err(envelope.application_error());
    }

    match envelope.data {
        Some(data @ Value::Object(_)) => Ok(snapshot_from_data(data)),
        Some(other) => Err(ApiError::InvalidResponse(format!(
            "order data is not an object: {other}"
        ))),
        None => Err(ApiError::InvalidResponse("missing order data".to_string())),
    }
}

/// Lift the known fields of an order payload into a snapshot.
pub fn snapshot_from_data(data: Value) -> OrderSnapshot {
    let from = leg(&data["from"]);
    let to = leg(&data["to"]);
    let refund_tx = data["back"].get("tx").and_then(tx);

    let emergency = data.get("emergency").and_then(emergency);

    let times = OrderTimes {
        created_at: unix_time(&data["time"]["reg"]),
        expires_at: unix_time(&data["time"]["expiration"]),
        finished_at: unix_time(&data["time"]["finish"]),
    };

    let snapshot = OrderSnapshot {
        order_id: text(&data["id"]),
        order_type: OrderType::from_upstream(&text(&data["type"])),
        raw_status: data.get("status").cloned().unwrap_or(Value::Null),
        from,
        to,
        refund_tx,
        emergency,
        times,
        received_at: Utc::now(),
        raw: data,
    };

    debug!(
        upstream_id = %snapshot.order_id,
        raw_status = %snapshot.raw_status,
        "Parsed order snapshot"
    );
    snapshot
}

fn leg(value: &Value) -> LegSnapshot {
    LegSnapshot {
        currency: text(&value["code"]),
        amount: amount(&value["amount"]),
        address: text(&value["address"]),
        tx: value.get("tx").and_then(tx),
    }
}

fn tx(value: &Value) -> Option<TxSnapshot> {
    if !value.is_object() {
        return None;
    }
    Some(TxSnapshot {
        id: text(&value["id"]),
        amount: amount(&value["amount"]),
        confirmations: value["confirmations"]
            .as_u64()
            .or_else(|| value["confirmations"].as_str()?.trim().parse().ok())
            .and_then(|c| u32::try_from(c).ok()),
    })
}

fn emergency(value: &Value) -> Option<EmergencyInfo> {
    if !value.is_object() {
        return None;
    }
    let reasons: Vec<String> = value["status"]
        .as_array()
        .map(|items| items.iter().map(text).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let choice = EmergencyChoice::from_upstream(&text(&value["choice"]));

    if reasons.is_empty() && choice == EmergencyChoice::None {
        return None;
    }
    Some(EmergencyInfo { reasons, choice })
}

/// String or number as text; anything else as empty.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn amount(value: &Value) -> Option<Amount> {
    let raw = text(value);
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}

fn unix_time(value: &Value) -> Option<DateTime<Utc>> {
    let secs = value
        .as_i64()
        .or_else(|| value.as_str()?.trim().parse().ok())?;
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}
