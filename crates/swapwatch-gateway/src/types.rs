//! Relay request and response bodies.

use serde::{Deserialize, Serialize};

/// Incoming `POST /bridge-status` body.
///
/// Both fields are optional at the serde level so a missing field yields the
/// relay's own 400 body instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct BridgeStatusRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl BridgeStatusRequest {
    /// Trimmed `(id, token)` if both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let id = self.id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let token = self.token.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((id, token))
    }
}

/// Body forwarded upstream. Field order is part of the signed bytes.
#[derive(Debug, Serialize)]
pub struct StatusRequest<'a> {
    pub id: &'a str,
    pub token: &'a str,
}

/// Error body returned by the relay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: u16,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
}

/// Diagnostics attached when `gateway.debug` is set.
///
/// Never carries the order token, API key or signing secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub request_details: RequestDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_details: Option<ResponseDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub url: String,
    pub method: &'static str,
    pub order_id: String,
    pub body_length: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDetails {
    pub status: u16,
    pub status_text: String,
    pub body_length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_both_fields() {
        let full: BridgeStatusRequest =
            serde_json::from_str(r#"{"id":" X1 ","token":"T1"}"#).unwrap();
        assert_eq!(full.credentials(), Some(("X1", "T1")));

        let missing: BridgeStatusRequest = serde_json::from_str(r#"{"id":"X1"}"#).unwrap();
        assert_eq!(missing.credentials(), None);

        let blank: BridgeStatusRequest =
            serde_json::from_str(r#"{"id":"X1","token":"  "}"#).unwrap();
        assert_eq!(blank.credentials(), None);
    }

    #[test]
    fn test_status_request_field_order() {
        let body = serde_json::to_string(&StatusRequest { id: "X1", token: "T1" }).unwrap();
        assert_eq!(body, r#"{"id":"X1","token":"T1"}"#);
    }

    #[test]
    fn test_error_body_omits_empty_fields() {
        let body = ErrorBody {
            code: 400,
            msg: "Missing order ID or token".to_string(),
            details: None,
            debug_info: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"code": 400, "msg": "Missing order ID or token"})
        );
    }
}
