//! Daily price bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Sort bars ascending by date and drop repeated dates, keeping the first
/// occurrence of each.
pub fn normalize(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    bars
}
