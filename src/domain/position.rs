//! Open bracket positions and closed trades.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Closed,
    EndOfBacktest,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop loss",
            ExitReason::TakeProfit => "take profit",
            ExitReason::Closed => "closed",
            ExitReason::EndOfBacktest => "end of backtest",
        };
        f.write_str(s)
    }
}

/// Signed quantity: positive is long, negative is short.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_commission: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    /// Cash set aside at entry.
    pub fn entry_notional(&self) -> f64 {
        self.quantity.unsigned_abs() as f64 * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }

    /// Escrowed notional plus unrealized PnL; what closing at `price` would
    /// return to cash before costs.
    pub fn settlement_value(&self, price: f64) -> f64 {
        self.entry_notional() + self.unrealized_pnl(price)
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.is_long() {
            price <= self.stop_loss
        } else {
            price >= self.stop_loss
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.is_long() {
            price >= self.take_profit
        } else {
            price <= self.take_profit
        }
    }

    /// Stop loss is checked first when both legs would trigger.
    pub fn bracket_exit(&self, price: f64) -> Option<ExitReason> {
        if self.should_stop_loss(price) {
            Some(ExitReason::StopLoss)
        } else if self.should_take_profit(price) {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}
