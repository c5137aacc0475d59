//! Historical market data port.

use crate::domain::error::CrosstraderError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Daily bars for `symbol` with `start <= date <= end`, ascending by date.
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, CrosstraderError>;
}
