//! Internal order status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Internal order status.
///
/// Success path: `AwaitingDeposit -> Confirming -> Exchanging -> Sending -> Completed`.
/// `Expired`, `Refunded` and `Error` are reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Waiting for the user's deposit.
    #[default]
    AwaitingDeposit,
    /// Deposit seen, waiting for confirmations.
    Confirming,
    /// Exchange in progress.
    Exchanging,
    /// Payout transaction being sent.
    Sending,
    /// Funds delivered.
    Completed,
    /// Deposit window elapsed.
    Expired,
    /// Deposit returned to the sender.
    Refunded,
    /// Upstream reported a problem, or a status we cannot classify.
    Error,
}

impl OrderStatus {
    /// All statuses, in rank order.
    pub const ALL: [OrderStatus; 8] = [
        Self::AwaitingDeposit,
        Self::Confirming,
        Self::Exchanging,
        Self::Sending,
        Self::Error,
        Self::Completed,
        Self::Expired,
        Self::Refunded,
    ];

    /// Progress index. Observed statuses never decrease in rank.
    ///
    /// `Error` sits above the success path so it can only move on to a
    /// terminal state.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::AwaitingDeposit => 0,
            Self::Confirming => 1,
            Self::Exchanging => 2,
            Self::Sending => 3,
            Self::Error => 4,
            Self::Completed | Self::Expired | Self::Refunded => 5,
        }
    }

    /// Returns true if no further transition is expected.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Refunded)
    }

    /// Returns true if moving from `self` to `next` respects forward progression.
    #[must_use]
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingDeposit => write!(f, "AWAITING_DEPOSIT"),
            Self::Confirming => write!(f, "CONFIRMING"),
            Self::Exchanging => write!(f, "EXCHANGING"),
            Self::Sending => write!(f, "SENDING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Refunded => write!(f, "REFUNDED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Parses the display form, ignoring case and treating `-` as `_`.
impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.to_string().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!("COMPLETED".parse::<OrderStatus>(), Ok(OrderStatus::Completed));
        assert_eq!("awaiting-deposit".parse::<OrderStatus>(), Ok(OrderStatus::AwaitingDeposit));
        assert!(matches!(
            "DONE".parse::<OrderStatus>(),
            Err(CoreError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = OrderStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .copied()
            .collect();
        assert_eq!(
            terminal,
            vec![
                OrderStatus::Completed,
                OrderStatus::Expired,
                OrderStatus::Refunded
            ]
        );
    }

    #[test]
    fn test_success_path_advances() {
        let path = [
            OrderStatus::AwaitingDeposit,
            OrderStatus::Confirming,
            OrderStatus::Exchanging,
            OrderStatus::Sending,
            OrderStatus::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]));
            assert!(!pair[1].can_advance_to(pair[0]));
        }
    }

    #[test]
    fn test_side_branches_reachable_from_non_terminal() {
        for from in OrderStatus::ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_advance_to(OrderStatus::Expired));
            assert!(from.can_advance_to(OrderStatus::Refunded));
            assert!(from.can_advance_to(OrderStatus::Error));
        }
    }

    #[test]
    fn test_terminal_is_final() {
        assert!(!OrderStatus::Completed.can_advance_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Expired.can_advance_to(OrderStatus::Error));
        assert!(OrderStatus::Completed.can_advance_to(OrderStatus::Completed));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&OrderStatus::AwaitingDeposit).unwrap();
        assert_eq!(json, r#""AWAITING_DEPOSIT""#);
    }
}
