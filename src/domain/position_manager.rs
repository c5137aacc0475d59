//! Position sizing and the buy/sell/hold state machine.
//!
//! Transitions per tick, gated on `cash > price`:
//!
//! - buy signal and last trade is not Buy: close an open short (if any),
//!   open a long bracket, last trade becomes Buy
//! - else sell signal and last trade is not Sell: close an open long (if
//!   any), open a short bracket, last trade becomes Sell
//! - otherwise hold
//!
//! Buy is checked first, so it wins if both signals are ever true at once.

use crate::domain::order::{BracketParams, OrderIntent, OrderSide};
use crate::domain::signal::SignalReading;
use crate::domain::trade_state::{LastTrade, TradeState};
use std::fmt;

pub const DEFAULT_CASH_AT_RISK: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionParams {
    pub cash_at_risk: f64,
    pub bracket: BracketParams,
}

impl Default for PositionParams {
    fn default() -> Self {
        PositionParams {
            cash_at_risk: DEFAULT_CASH_AT_RISK,
            bracket: BracketParams::default(),
        }
    }
}

/// Whole shares for `cash * cash_at_risk` at `price`, rounded half-to-even.
pub fn position_sizing(cash: f64, price: f64, cash_at_risk: f64) -> u64 {
    if price.is_nan() || price <= 0.0 || !cash.is_finite() {
        return 0;
    }
    let shares = (cash * cash_at_risk / price).round_ties_even();
    if shares > 0.0 { shares as u64 } else { 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    InsufficientCash,
    NoSignal,
    AlreadyLong,
    AlreadyShort,
    ZeroQuantity,
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HoldReason::InsufficientCash => "insufficient cash",
            HoldReason::NoSignal => "no signal",
            HoldReason::AlreadyLong => "already long",
            HoldReason::AlreadyShort => "already short",
            HoldReason::ZeroQuantity => "zero quantity",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Hold(HoldReason),
    Open {
        intent: OrderIntent,
        /// Close the opposite position before submitting `intent`.
        close_existing: bool,
    },
}

impl Decision {
    pub fn is_hold(&self) -> bool {
        matches!(self, Decision::Hold(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Hold(reason) => write!(f, "hold ({})", reason),
            Decision::Open {
                intent,
                close_existing,
            } => {
                if *close_existing {
                    write!(f, "close + ")?;
                }
                write!(
                    f,
                    "{} {} {} tp={:.2} sl={:.2}",
                    intent.side,
                    intent.quantity,
                    intent.symbol,
                    intent.take_profit_price,
                    intent.stop_loss_price
                )
            }
        }
    }
}

pub fn decide(
    state: TradeState,
    reading: &SignalReading,
    symbol: &str,
    cash: f64,
    price: f64,
    params: &PositionParams,
) -> (TradeState, Decision) {
    if cash <= price {
        return (state, Decision::Hold(HoldReason::InsufficientCash));
    }

    let last = state.last_trade;
    let side = if reading.buy && last != LastTrade::Buy {
        OrderSide::Buy
    } else if reading.sell && last != LastTrade::Sell {
        OrderSide::Sell
    } else {
        let reason = if reading.buy {
            HoldReason::AlreadyLong
        } else if reading.sell {
            HoldReason::AlreadyShort
        } else {
            HoldReason::NoSignal
        };
        return (state, Decision::Hold(reason));
    };

    let quantity = position_sizing(cash, price, params.cash_at_risk);
    if quantity == 0 {
        return (state, Decision::Hold(HoldReason::ZeroQuantity));
    }

    let (close_existing, next) = match side {
        OrderSide::Buy => (last == LastTrade::Sell, LastTrade::Buy),
        OrderSide::Sell => (last == LastTrade::Buy, LastTrade::Sell),
    };

    let intent = OrderIntent::bracket(symbol, quantity, side, price, &params.bracket);
    (
        TradeState::with_last_trade(next),
        Decision::Open {
            intent,
            close_existing,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(buy: bool, sell: bool) -> SignalReading {
        SignalReading {
            prev_fast: Some(100.0),
            prev_slow: Some(100.0),
            fast: Some(100.0),
            slow: Some(100.0),
            buy,
            sell,
        }
    }

    fn params() -> PositionParams {
        PositionParams::default()
    }

    #[test]
    fn sizing_half_of_cash() {
        assert_eq!(position_sizing(10_000.0, 100.0, 0.5), 50);
    }

    #[test]
    fn sizing_rounds_to_nearest() {
        // 10000 * 0.5 / 300 = 16.67
        assert_eq!(position_sizing(10_000.0, 300.0, 0.5), 17);
        // 10000 * 0.5 / 3000 = 1.67
        assert_eq!(position_sizing(10_000.0, 3000.0, 0.5), 2);
    }

    #[test]
    fn sizing_ties_round_to_even() {
        assert_eq!(position_sizing(250.0, 100.0, 1.0), 2);
        assert_eq!(position_sizing(350.0, 100.0, 1.0), 4);
        assert_eq!(position_sizing(100.0, 200.0, 1.0), 0);
    }

    #[test]
    fn sizing_non_positive_price() {
        assert_eq!(position_sizing(10_000.0, 0.0, 0.5), 0);
        assert_eq!(position_sizing(10_000.0, -1.0, 0.5), 0);
        assert_eq!(position_sizing(10_000.0, f64::NAN, 0.5), 0);
    }

    #[test]
    fn buy_from_flat_opens_long() {
        let (state, decision) = decide(TradeState::new(), &reading(true, false), "AAPL", 10_000.0, 100.0, &params());

        assert_eq!(state.last_trade, LastTrade::Buy);
        match decision {
            Decision::Open {
                intent,
                close_existing,
            } => {
                assert!(!close_existing);
                assert_eq!(intent.side, OrderSide::Buy);
                assert_eq!(intent.quantity, 50);
                assert!((intent.take_profit_price - 150.0).abs() < 1e-9);
                assert!((intent.stop_loss_price - 95.0).abs() < 1e-9);
            }
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[test]
    fn sell_from_flat_opens_short() {
        let (state, decision) = decide(TradeState::new(), &reading(false, true), "AAPL", 10_000.0, 100.0, &params());

        assert_eq!(state.last_trade, LastTrade::Sell);
        match decision {
            Decision::Open {
                intent,
                close_existing,
            } => {
                assert!(!close_existing);
                assert_eq!(intent.side, OrderSide::Sell);
                assert!((intent.take_profit_price - 80.0).abs() < 1e-9);
                assert!((intent.stop_loss_price - 105.0).abs() < 1e-9);
            }
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[test]
    fn repeated_buy_is_suppressed() {
        let state = TradeState::with_last_trade(LastTrade::Buy);
        let (next, decision) = decide(state, &reading(true, false), "AAPL", 10_000.0, 100.0, &params());

        assert_eq!(next, state);
        assert_eq!(decision, Decision::Hold(HoldReason::AlreadyLong));
    }

    #[test]
    fn repeated_sell_is_suppressed() {
        let state = TradeState::with_last_trade(LastTrade::Sell);
        let (next, decision) = decide(state, &reading(false, true), "AAPL", 10_000.0, 100.0, &params());

        assert_eq!(next, state);
        assert_eq!(decision, Decision::Hold(HoldReason::AlreadyShort));
    }

    #[test]
    fn sell_after_buy_closes_first() {
        let state = TradeState::with_last_trade(LastTrade::Buy);
        let (next, decision) = decide(state, &reading(false, true), "AAPL", 10_000.0, 100.0, &params());

        assert_eq!(next.last_trade, LastTrade::Sell);
        assert!(matches!(
            decision,
            Decision::Open {
                close_existing: true,
                ..
            }
        ));
    }

    #[test]
    fn buy_after_sell_closes_first() {
        let state = TradeState::with_last_trade(LastTrade::Sell);
        let (next, decision) = decide(state, &reading(true, false), "AAPL", 10_000.0, 100.0, &params());

        assert_eq!(next.last_trade, LastTrade::Buy);
        assert!(matches!(
            decision,
            Decision::Open {
                close_existing: true,
                ..
            }
        ));
    }

    #[test]
    fn no_signal_holds() {
        let (next, decision) = decide(TradeState::new(), &reading(false, false), "AAPL", 10_000.0, 100.0, &params());
        assert_eq!(next, TradeState::new());
        assert_eq!(decision, Decision::Hold(HoldReason::NoSignal));
    }

    #[test]
    fn cash_not_above_price_holds() {
        let (next, decision) = decide(TradeState::new(), &reading(true, false), "AAPL", 100.0, 100.0, &params());
        assert_eq!(next, TradeState::new());
        assert_eq!(decision, Decision::Hold(HoldReason::InsufficientCash));
    }

    #[test]
    fn cash_gate_applies_before_closing() {
        let state = TradeState::with_last_trade(LastTrade::Buy);
        let (next, decision) = decide(state, &reading(false, true), "AAPL", 50.0, 100.0, &params());
        assert_eq!(next, state);
        assert_eq!(decision, Decision::Hold(HoldReason::InsufficientCash));
    }

    #[test]
    fn zero_quantity_holds_without_state_change() {
        let p = PositionParams {
            cash_at_risk: 0.1,
            ..params()
        };
        // 150 * 0.1 / 100 = 0.15
        let (next, decision) = decide(TradeState::new(), &reading(true, false), "AAPL", 150.0, 100.0, &p);
        assert_eq!(next, TradeState::new());
        assert_eq!(decision, Decision::Hold(HoldReason::ZeroQuantity));
    }

    #[test]
    fn buy_takes_precedence_over_sell() {
        let (next, decision) = decide(TradeState::new(), &reading(true, true), "AAPL", 10_000.0, 100.0, &params());
        assert_eq!(next.last_trade, LastTrade::Buy);
        match decision {
            Decision::Open { intent, .. } => assert_eq!(intent.side, OrderSide::Buy),
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[test]
    fn both_signals_while_long_falls_through_to_sell() {
        let state = TradeState::with_last_trade(LastTrade::Buy);
        let (next, _) = decide(state, &reading(true, true), "AAPL", 10_000.0, 100.0, &params());
        assert_eq!(next.last_trade, LastTrade::Sell);
    }

    #[test]
    fn decision_display() {
        let (_, decision) = decide(TradeState::new(), &reading(true, false), "AAPL", 10_000.0, 100.0, &params());
        assert_eq!(decision.to_string(), "buy 50 AAPL tp=150.00 sl=95.00");
        assert_eq!(Decision::Hold(HoldReason::NoSignal).to_string(), "hold (no signal)");
    }
}
