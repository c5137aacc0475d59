//! Simple Moving Average indicator.
//!
//! SMA[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_sma(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Sma(period),
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            values.push(IndicatorPoint {
                date: bar.date,
                valid: false,
                value: 0.0,
            });
        } else {
            // Each window summed from scratch: equal windows give equal means.
            let window = &bars[i + 1 - period..=i];
            let mean = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
            values.push(IndicatorPoint {
                date: bar.date,
                valid: true,
                value: mean,
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn sma_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_sma(&bars, 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn sma_rolling_mean() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_sma(&bars, 3);

        assert!((series.values[2].value - 20.0).abs() < f64::EPSILON);
        assert!((series.values[3].value - 30.0).abs() < f64::EPSILON);
        assert!((series.values[4].value - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_aligned_to_bar_dates() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let series = calculate_sma(&bars, 2);
        for (point, bar) in series.values.iter().zip(&bars) {
            assert_eq!(point.date, bar.date);
        }
    }

    #[test]
    fn sma_period_1_is_close() {
        let bars = make_bars(&[10.0, 20.0]);
        let series = calculate_sma(&bars, 1);
        assert!(series.values.iter().all(|p| p.valid));
        assert!((series.values[1].value - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_fewer_bars_than_period() {
        let bars = make_bars(&[10.0, 20.0]);
        let series = calculate_sma(&bars, 5);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn sma_empty_bars() {
        let series = calculate_sma(&[], 3);
        assert!(series.values.is_empty());
    }

    #[test]
    fn sma_period_0() {
        let bars = make_bars(&[10.0, 20.0]);
        let series = calculate_sma(&bars, 0);
        assert!(series.values.is_empty());
        assert_eq!(series.indicator_type, IndicatorType::Sma(0));
    }
}
