//! Moving-average crossover signal.
//!
//! Two simple moving averages over the closing price, compared at the last
//! two bars of the history:
//!
//! - buy:  fast[-2] <= slow[-2] && fast[-1] > slow[-1]
//! - sell: fast[-2] >= slow[-2] && fast[-1] < slow[-1]
//!
//! Equality counts as "not yet crossed". Until both averages have two valid
//! points (`slow + 1` bars) neither signal fires.

use crate::domain::indicator::sma::calculate_sma;
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_FAST_WINDOW: usize = 20;
pub const DEFAULT_SLOW_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverWindows {
    pub fast: usize,
    pub slow: usize,
}

impl Default for CrossoverWindows {
    fn default() -> Self {
        CrossoverWindows {
            fast: DEFAULT_FAST_WINDOW,
            slow: DEFAULT_SLOW_WINDOW,
        }
    }
}

impl CrossoverWindows {
    /// Bars needed before a crossover can be observed.
    pub fn min_bars(&self) -> usize {
        self.fast.max(self.slow) + 1
    }
}

/// Averages at the last two bars and the resulting signals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalReading {
    pub prev_fast: Option<f64>,
    pub prev_slow: Option<f64>,
    pub fast: Option<f64>,
    pub slow: Option<f64>,
    pub buy: bool,
    pub sell: bool,
}

impl SignalReading {
    pub fn has_history(&self) -> bool {
        self.prev_fast.is_some() && self.prev_slow.is_some() && self.fast.is_some() && self.slow.is_some()
    }
}

pub fn evaluate(bars: &[PriceBar], windows: CrossoverWindows) -> SignalReading {
    let fast_series = calculate_sma(bars, windows.fast);
    let slow_series = calculate_sma(bars, windows.slow);

    let mut reading = SignalReading {
        prev_fast: fast_series.valid_from_end(1),
        prev_slow: slow_series.valid_from_end(1),
        fast: fast_series.valid_from_end(0),
        slow: slow_series.valid_from_end(0),
        buy: false,
        sell: false,
    };

    if let (Some(prev_fast), Some(prev_slow), Some(fast), Some(slow)) =
        (reading.prev_fast, reading.prev_slow, reading.fast, reading.slow)
    {
        reading.buy = prev_fast <= prev_slow && fast > slow;
        reading.sell = prev_fast >= prev_slow && fast < slow;
    }

    reading
}

pub fn buy_signal(bars: &[PriceBar], windows: CrossoverWindows) -> bool {
    evaluate(bars, windows).buy
}

pub fn sell_signal(bars: &[PriceBar], windows: CrossoverWindows) -> bool {
    evaluate(bars, windows).sell
}
