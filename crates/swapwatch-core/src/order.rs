//! Order identifiers and credentials.
//!
//! Provides the upstream order id, the capability token required to query
//! an order, and the fixed/float order type.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};

/// Maximum accepted length for order ids and tokens.
const MAX_IDENT_LEN: usize = 128;

/// Upstream-assigned order id.
///
/// Opaque to us beyond basic shape validation: non-empty, no whitespace,
/// ASCII alphanumerics plus `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Parse and validate an order id.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidOrderId("order id is empty".to_string()));
        }
        if trimmed.len() > MAX_IDENT_LEN {
            return Err(CoreError::InvalidOrderId(format!(
                "order id longer than {MAX_IDENT_LEN} characters"
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidOrderId(format!(
                "order id contains invalid characters: {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Capability token accompanying every status request.
///
/// Treated like a secret: the value is zeroized on drop, `Debug` and
/// `Display` are redacted, and it has no `Serialize` impl.
#[derive(Clone, PartialEq, Eq)]
pub struct OrderToken(Zeroizing<String>);

impl OrderToken {
    /// Parse and validate a token (non-empty, printable ASCII, no whitespace).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidToken("token is empty".to_string()));
        }
        if trimmed.len() > MAX_IDENT_LEN {
            return Err(CoreError::InvalidToken(format!(
                "token longer than {MAX_IDENT_LEN} characters"
            )));
        }
        if !trimmed.chars().all(|c| c.is_ascii_graphic()) {
            return Err(CoreError::InvalidToken(
                "token contains non-printable characters".to_string(),
            ));
        }
        Ok(Self(Zeroizing::new(trimmed.to_string())))
    }

    /// Expose the raw token. Only for building the signed request body.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for OrderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OrderToken(***)")
    }
}

impl fmt::Display for OrderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Rate locked at creation.
    #[default]
    Fixed,
    /// Rate re-quoted at settlement.
    Float,
}

impl OrderType {
    /// Parse the upstream `type` field. Unknown values fall back to fixed.
    pub fn from_upstream(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("float") {
            Self::Float
        } else {
            Self::Fixed
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Float => write!(f, "float"),
        }
    }
}
