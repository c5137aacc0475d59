//! Technical indicator series.
//!
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a time series aligned to bar dates

pub mod sma;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value `offset` points back from the end (0 = last), if that point is valid.
    pub fn valid_from_end(&self, offset: usize) -> Option<f64> {
        let idx = self.values.len().checked_sub(offset + 1)?;
        let point = &self.values[idx];
        point.valid.then_some(point.value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
        }
    }
}
