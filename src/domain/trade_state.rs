//! Last-trade direction carried between iterations.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastTrade {
    #[default]
    None,
    Buy,
    Sell,
}

impl fmt::Display for LastTrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastTrade::None => write!(f, "none"),
            LastTrade::Buy => write!(f, "buy"),
            LastTrade::Sell => write!(f, "sell"),
        }
    }
}

/// Strategy state threaded through each decision. Starts flat at process
/// start and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradeState {
    pub last_trade: LastTrade,
}

impl TradeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last_trade(last_trade: LastTrade) -> Self {
        TradeState { last_trade }
    }
}
