//! Bracket order intents.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Take-profit and stop-loss levels as multiples of the entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketParams {
    pub long_take_profit: f64,
    pub long_stop_loss: f64,
    pub short_take_profit: f64,
    pub short_stop_loss: f64,
}

impl Default for BracketParams {
    fn default() -> Self {
        BracketParams {
            long_take_profit: 1.50,
            long_stop_loss: 0.95,
            short_take_profit: 0.80,
            short_stop_loss: 1.05,
        }
    }
}

impl BracketParams {
    /// (take_profit, stop_loss) prices for an entry at `price`.
    pub fn levels(&self, side: OrderSide, price: f64) -> (f64, f64) {
        match side {
            OrderSide::Buy => (price * self.long_take_profit, price * self.long_stop_loss),
            OrderSide::Sell => (price * self.short_take_profit, price * self.short_stop_loss),
        }
    }
}

/// An entry order with linked take-profit and stop-loss exits.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub quantity: u64,
    pub side: OrderSide,
    pub take_profit_price: f64,
    pub stop_loss_price: f64,
}

impl OrderIntent {
    pub fn bracket(
        symbol: &str,
        quantity: u64,
        side: OrderSide,
        price: f64,
        bracket: &BracketParams,
    ) -> Self {
        let (take_profit_price, stop_loss_price) = bracket.levels(side, price);
        OrderIntent {
            symbol: symbol.to_string(),
            quantity,
            side,
            take_profit_price,
            stop_loss_price,
        }
    }
}
