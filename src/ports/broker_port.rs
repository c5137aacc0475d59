//! Brokerage account and order port.

use crate::domain::error::CrosstraderError;
use crate::domain::order::OrderIntent;

pub trait BrokerPort {
    fn get_cash(&self) -> Result<f64, CrosstraderError>;

    fn get_last_price(&self, symbol: &str) -> Result<f64, CrosstraderError>;

    /// Submit a bracket order. Returns the broker's order id.
    fn submit_order(&mut self, intent: &OrderIntent) -> Result<String, CrosstraderError>;

    /// Flatten any open position in `symbol`. Closing when flat is not an error.
    fn close_position(&mut self, symbol: &str) -> Result<(), CrosstraderError>;
}
