//! Simulated account state and equity tracking.

use chrono::NaiveDate;

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Single-symbol account: at most one open position.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }

    pub fn total_equity(&self, price: f64) -> f64 {
        let position_value = self
            .position
            .as_ref()
            .map(|pos| pos.settlement_value(price))
            .unwrap_or(0.0);
        self.cash + position_value
    }
}
