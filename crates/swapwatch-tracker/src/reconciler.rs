//! Reconcile a fresh observation against the previously known order.
//!
//! `reconcile` is a pure function: the previous order is only borrowed and a
//! new [`Order`] is returned together with any divergences. Divergences are
//! advisory; they never stop the status from progressing.

use rust_decimal::Decimal;
use swapwatch_core::{Divergence, Order, OrderId, OrderToken, OrderType, Rate};

use crate::mapper::Observation;

/// Default relative rate drift that triggers a divergence (5%).
pub fn default_rate_threshold() -> Decimal {
    Decimal::new(5, 2)
}

/// Inputs to reconciliation that do not come from the upstream.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    pub order_id: OrderId,
    pub token: OrderToken,
    /// Rate the user was quoted, if known. Seeds the drift baseline.
    pub quoted_rate: Option<Rate>,
    /// Relative drift above which a rate divergence is reported.
    pub rate_threshold: Decimal,
}

impl ReconcileContext {
    pub fn new(order_id: OrderId, token: OrderToken) -> Self {
        Self {
            order_id,
            token,
            quoted_rate: None,
            rate_threshold: default_rate_threshold(),
        }
    }
}

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub order: Order,
    pub divergences: Vec<Divergence>,
}

/// Build the next order state from `previous` and `fresh`.
pub fn reconcile(
    previous: Option<&Order>,
    fresh: &Observation,
    ctx: &ReconcileContext,
) -> Reconciliation {
    let snap = &fresh.snapshot;
    let fresh_rate = snap.rate();
    let mut divergences = Vec::new();

    let status = match previous {
        Some(prev) if !fresh.simulated && !prev.status.can_advance_to(fresh.status) => {
            divergences.push(Divergence::StatusRegression {
                current: prev.status,
                reported: fresh.status,
            });
            prev.status
        }
        _ => fresh.status,
    };

    let destination_address = pick(snap.destination_address(), previous.map(|p| p.destination_address.as_str()));
    if let Some(prev) = previous {
        if !prev.destination_address.is_empty()
            && !snap.destination_address().is_empty()
            && prev.destination_address != snap.destination_address()
        {
            divergences.push(Divergence::DestinationAddress {
                expected: prev.destination_address.clone(),
                observed: snap.destination_address().to_string(),
            });
        }
    }

    let quoted_rate = previous
        .and_then(|p| p.quoted_rate)
        .or(ctx.quoted_rate)
        .or(fresh_rate);

    if previous.is_some() && snap.order_type == OrderType::Float {
        if let (Some(quoted), Some(observed)) = (quoted_rate, fresh_rate) {
            if let Some(drift) = observed.relative_drift(quoted) {
                if drift > ctx.rate_threshold {
                    divergences.push(Divergence::Rate {
                        quoted,
                        observed,
                        drift,
                    });
                }
            }
        }
    }

    let order = Order {
        order_id: ctx.order_id.clone(),
        token: ctx.token.clone(),
        from_currency: pick(&snap.from.currency, previous.map(|p| p.from_currency.as_str())),
        to_currency: pick(&snap.to.currency, previous.map(|p| p.to_currency.as_str())),
        amount: snap.from.amount.or(previous.and_then(|p| p.amount)),
        receive_amount: snap.to.amount.or(previous.and_then(|p| p.receive_amount)),
        order_type: snap.order_type,
        deposit_address: pick(snap.deposit_address(), previous.map(|p| p.deposit_address.as_str())),
        destination_address,
        status,
        rate: fresh_rate.or(previous.and_then(|p| p.rate)),
        quoted_rate,
        emergency: snap.emergency.clone(),
        raw_api_data: snap.raw.clone(),
        observed_at: snap.received_at,
        simulated: fresh.simulated,
    };

    Reconciliation { order, divergences }
}

/// Fresh value, or the previous one when the upstream omitted it.
fn pick(fresh: &str, previous: Option<&str>) -> String {
    if fresh.is_empty() {
        previous.unwrap_or_default().to_string()
    } else {
        fresh.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use swapwatch_core::{Amount, LegSnapshot, OrderSnapshot, OrderStatus, OrderTimes};

    fn ctx() -> ReconcileContext {
        ReconcileContext::new(OrderId::parse("X1").unwrap(), OrderToken::parse("T1").unwrap())
    }

    /// Observation sending 1 unit and receiving `receive` units.
    fn observation(status: &str, order_type: OrderType, receive: Decimal, dest: &str) -> Observation {
        let snapshot = OrderSnapshot {
            order_id: "X1".to_string(),
            order_type,
            raw_status: json!(status),
            from: LegSnapshot {
                currency: "BTC".to_string(),
                amount: Some(Amount::new(dec!(1))),
                address: "bc1qdeposit".to_string(),
                tx: None,
            },
            to: LegSnapshot {
                currency: "USDT".to_string(),
                amount: Some(Amount::new(receive)),
                address: dest.to_string(),
                tx: None,
            },
            refund_tx: None,
            emergency: None,
            times: OrderTimes::default(),
            raw: json!({"id": "X1", "status": status}),
            received_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        Observation::from_upstream(snapshot)
    }

    #[test]
    fn test_first_observation_has_no_divergences() {
        let mut ctx = ctx();
        ctx.quoted_rate = Some(Rate::new(dec!(100)));
        let fresh = observation("NEW", OrderType::Float, dec!(150), "0xdest");

        let result = reconcile(None, &fresh, &ctx);
        assert!(result.divergences.is_empty());
        assert_eq!(result.order.status, OrderStatus::AwaitingDeposit);
        assert_eq!(result.order.quoted_rate, Some(Rate::new(dec!(100))));
        assert_eq!(result.order.rate, Some(Rate::new(dec!(150))));
    }

    #[test]
    fn test_rate_drift_above_threshold() {
        let ctx = ctx();
        let first = reconcile(None, &observation("NEW", OrderType::Float, dec!(100), "0xdest"), &ctx);
        assert_eq!(first.order.quoted_rate, Some(Rate::new(dec!(100))));

        let drifted = reconcile(
            Some(&first.order),
            &observation("PENDING", OrderType::Float, dec!(106), "0xdest"),
            &ctx,
        );
        assert_eq!(
            drifted.divergences,
            vec![Divergence::Rate {
                quoted: Rate::new(dec!(100)),
                observed: Rate::new(dec!(106)),
                drift: dec!(0.06),
            }]
        );
        assert_eq!(drifted.order.status, OrderStatus::Confirming, "divergence never blocks");
        // Baseline stays at the first observation.
        assert_eq!(drifted.order.quoted_rate, Some(Rate::new(dec!(100))));

        let small = reconcile(
            Some(&first.order),
            &observation("PENDING", OrderType::Float, dec!(103), "0xdest"),
            &ctx,
        );
        assert!(small.divergences.is_empty());
    }

    #[test]
    fn test_extreme_amounts_report_drift() {
        let ctx = ctx();
        let mut cheap = observation("NEW", OrderType::Float, dec!(0.0000000001), "0xdest");
        cheap.snapshot.from.amount = Some(Amount::new(dec!(1)));
        let first = reconcile(None, &cheap, &ctx);
        assert_eq!(first.order.quoted_rate, Some(Rate::new(dec!(0.0000000001))));

        let mut spike = observation("PENDING", OrderType::Float, dec!(1000000000000000000), "0xdest");
        spike.snapshot.from.amount = Some(Amount::new(dec!(0.0000000001)));
        let result = reconcile(Some(&first.order), &spike, &ctx);

        assert_eq!(result.order.status, OrderStatus::Confirming);
        assert!(matches!(
            result.divergences.as_slice(),
            [Divergence::Rate { drift, .. }] if *drift == Decimal::MAX
        ));
    }

    #[test]
    fn test_threshold_is_strict() {
        let ctx = ctx();
        let first = reconcile(None, &observation("NEW", OrderType::Float, dec!(100), "0xdest"), &ctx);
        let exact = reconcile(
            Some(&first.order),
            &observation("NEW", OrderType::Float, dec!(105), "0xdest"),
            &ctx,
        );
        assert!(exact.divergences.is_empty());
    }

    #[test]
    fn test_fixed_orders_ignore_rate() {
        let ctx = ctx();
        let first = reconcile(None, &observation("NEW", OrderType::Fixed, dec!(100), "0xdest"), &ctx);
        let moved = reconcile(
            Some(&first.order),
            &observation("PENDING", OrderType::Fixed, dec!(120), "0xdest"),
            &ctx,
        );
        assert!(moved.divergences.is_empty());
    }

    #[test]
    fn test_destination_change() {
        let ctx = ctx();
        let first = reconcile(None, &observation("NEW", OrderType::Fixed, dec!(100), "0xdest"), &ctx);
        let changed = reconcile(
            Some(&first.order),
            &observation("PENDING", OrderType::Fixed, dec!(100), "0xother"),
            &ctx,
        );
        assert_eq!(
            changed.divergences,
            vec![Divergence::DestinationAddress {
                expected: "0xdest".to_string(),
                observed: "0xother".to_string(),
            }]
        );

        // An omitted address keeps the previous one without a divergence.
        let omitted = reconcile(
            Some(&first.order),
            &observation("PENDING", OrderType::Fixed, dec!(100), ""),
            &ctx,
        );
        assert!(omitted.divergences.is_empty());
        assert_eq!(omitted.order.destination_address, "0xdest");
    }

    #[test]
    fn test_regression_is_held() {
        let ctx = ctx();
        let first = reconcile(None, &observation("EXCHANGE", OrderType::Fixed, dec!(100), "0xdest"), &ctx);
        let regressed = reconcile(
            Some(&first.order),
            &observation("PENDING", OrderType::Fixed, dec!(100), "0xdest"),
            &ctx,
        );

        assert_eq!(regressed.order.status, OrderStatus::Exchanging);
        assert_eq!(
            regressed.divergences,
            vec![Divergence::StatusRegression {
                current: OrderStatus::Exchanging,
                reported: OrderStatus::Confirming,
            }]
        );
    }

    #[test]
    fn test_terminal_is_sticky() {
        let ctx = ctx();
        let done = reconcile(None, &observation("DONE", OrderType::Fixed, dec!(100), "0xdest"), &ctx);
        let after = reconcile(
            Some(&done.order),
            &observation("EXPIRED", OrderType::Fixed, dec!(100), "0xdest"),
            &ctx,
        );
        assert_eq!(after.order.status, OrderStatus::Completed);
    }

    #[test]
    fn test_simulation_may_regress() {
        let ctx = ctx();
        let done = reconcile(None, &observation("DONE", OrderType::Fixed, dec!(100), "0xdest"), &ctx);
        let mut fake = observation("NEW", OrderType::Fixed, dec!(100), "0xdest");
        fake.simulated = true;

        let result = reconcile(Some(&done.order), &fake, &ctx);
        assert_eq!(result.order.status, OrderStatus::AwaitingDeposit);
        assert!(result.order.simulated);
        assert!(result.divergences.is_empty());
    }

    #[test]
    fn test_reconcile_is_pure() {
        let ctx = ctx();
        let first = reconcile(None, &observation("NEW", OrderType::Float, dec!(100), "0xdest"), &ctx);
        let snapshot_before = first.order.clone();
        let fresh = observation("PENDING", OrderType::Float, dec!(110), "0xnew");

        let a = reconcile(Some(&first.order), &fresh, &ctx);
        let b = reconcile(Some(&first.order), &fresh, &ctx);

        assert_eq!(a, b);
        assert_eq!(first.order, snapshot_before);
        assert_eq!(a.divergences.len(), 2);
    }
}
