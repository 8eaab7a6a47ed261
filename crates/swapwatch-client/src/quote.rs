//! Price quotes.
//!
//! A quote is the upstream's estimate for sending an amount of one currency
//! in exchange for another. Its rate seeds the drift baseline of a watched
//! order. Drift between two quotes is checked against an explicit previous
//! rate passed in by the caller.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use swapwatch_core::{Amount, OrderType, Rate};
use tracing::debug;

use crate::envelope::ApiEnvelope;
use crate::error::{ApiError, ApiResult};

/// Path of the price endpoint.
pub const PRICE_PATH: &str = "/price";

/// What to quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub from_currency: String,
    pub to_currency: String,
    /// Amount to send.
    pub amount: Amount,
    pub order_type: OrderType,
}

impl QuoteRequest {
    pub fn new(
        from_currency: impl Into<String>,
        to_currency: impl Into<String>,
        amount: Amount,
        order_type: OrderType,
    ) -> Self {
        Self {
            from_currency: from_currency.into(),
            to_currency: to_currency.into(),
            amount,
            order_type,
        }
    }

    /// # Errors
    /// `ApiError::Validation` for a blank currency or a non-positive amount.
    pub fn validate(&self) -> ApiResult<()> {
        if self.from_currency.trim().is_empty() || self.to_currency.trim().is_empty() {
            return Err(ApiError::Validation("quote currencies must not be empty".into()));
        }
        if !self.amount.is_positive() {
            return Err(ApiError::Validation(format!(
                "quote amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }

    pub(crate) fn body(&self) -> PriceBody<'_> {
        PriceBody {
            order_type: match self.order_type {
                OrderType::Fixed => "fixed",
                OrderType::Float => "float",
            },
            from_ccy: self.from_currency.trim(),
            to_ccy: self.to_currency.trim(),
            direction: "from",
            amount: self.amount.to_string(),
        }
    }
}

/// Price request body. Field order is part of the signature.
#[derive(Serialize)]
pub(crate) struct PriceBody<'a> {
    #[serde(rename = "type")]
    order_type: &'a str,
    #[serde(rename = "fromCcy")]
    from_ccy: &'a str,
    #[serde(rename = "toCcy")]
    to_ccy: &'a str,
    direction: &'a str,
    amount: String,
}

/// Upstream price estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub from_currency: String,
    pub to_currency: String,
    pub send_amount: Amount,
    pub receive_amount: Amount,
    pub order_type: OrderType,
    /// Receive units per unit sent.
    pub rate: Rate,
}

/// Parse a 2xx price response body.
pub fn parse_price_response(body: &str, order_type: OrderType) -> ApiResult<PriceQuote> {
    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|e| ApiError::InvalidResponse(format!("malformed envelope: {e}")))?;
    if !envelope.is_success() {
        return Err(envelope.application_error());
    }
    let data = match envelope.data {
        Some(data @ Value::Object(_)) => data,
        _ => return Err(ApiError::InvalidResponse("missing price data".to_string())),
    };

    let errors: Vec<&str> = data["errors"]
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !errors.is_empty() {
        return Err(ApiError::InvalidResponse(format!(
            "quote unavailable: {}",
            errors.join(", ")
        )));
    }

    let send_amount = leg_amount(&data["from"], "from")?;
    let receive_amount = leg_amount(&data["to"], "to")?;
    let rate = send_amount
        .rate_to(receive_amount)
        .ok_or_else(|| ApiError::InvalidResponse("quote has no usable rate".to_string()))?;

    let quote = PriceQuote {
        from_currency: leg_code(&data["from"]),
        to_currency: leg_code(&data["to"]),
        send_amount,
        receive_amount,
        order_type,
        rate,
    };
    debug!(
        from = %quote.from_currency,
        to = %quote.to_currency,
        rate = %quote.rate,
        "Parsed price quote"
    );
    Ok(quote)
}

/// Relative drift of `fresh` from the `previous` quoted rate when it
/// exceeds `threshold`.
pub fn quote_drift(previous: Option<Rate>, fresh: &PriceQuote, threshold: Decimal) -> Option<Decimal> {
    let drift = fresh.rate.relative_drift(previous?)?;
    (drift > threshold).then_some(drift)
}

fn leg_code(value: &Value) -> String {
    value["code"].as_str().unwrap_or_default().to_string()
}

fn leg_amount(value: &Value, side: &str) -> ApiResult<Amount> {
    let raw = match &value["amount"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    raw.parse()
        .map_err(|_| ApiError::InvalidResponse(format!("quote {side} amount is missing")))
}
