//! Precision-safe decimal types for swap quantities.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. Upstream quantities
//! arrive as decimal strings and are never routed through floating point.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currency quantity with exact decimal precision.
///
/// Serialized as a decimal string to round-trip the upstream representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(#[serde(with = "rust_decimal::serde::str")] pub Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Rate implied by sending `self` and receiving `received`.
    ///
    /// Returns None when nothing was sent.
    pub fn rate_to(&self, received: Amount) -> Option<Rate> {
        if !self.is_positive() {
            return None;
        }
        received.0.checked_div(self.0).map(Rate)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Amount {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

/// Exchange rate: units of the receive currency per unit sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(#[serde(with = "rust_decimal::serde::str")] pub Decimal);

impl Rate {
    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Relative drift `|self - baseline| / baseline`.
    ///
    /// Returns None for a zero baseline. A drift too large to represent
    /// saturates at `Decimal::MAX`.
    pub fn relative_drift(&self, baseline: Rate) -> Option<Decimal> {
        if baseline.is_zero() {
            return None;
        }
        let drift = self
            .0
            .checked_sub(baseline.0)
            .and_then(|delta| delta.checked_div(baseline.0))
            .map(|d| d.abs())
            .unwrap_or(Decimal::MAX);
        Some(drift)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Rate {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}
