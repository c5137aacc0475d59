#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use crosstrader::domain::error::CrosstraderError;
pub use crosstrader::domain::ohlcv::PriceBar;
use crosstrader::domain::order::OrderIntent;
use crosstrader::ports::broker_port::BrokerPort;
use crosstrader::ports::data_port::MarketDataPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub requests: RefCell<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, CrosstraderError> {
        self.requests
            .borrow_mut()
            .push((symbol.to_string(), start, end));
        if let Some(reason) = self.errors.get(symbol) {
            return Err(CrosstraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Broker fake that records every mutating call in order.
pub struct MockBroker {
    pub cash: f64,
    pub price: f64,
    pub calls: Vec<String>,
    pub orders: Vec<OrderIntent>,
    pub reject_orders: bool,
}

impl MockBroker {
    pub fn new(cash: f64, price: f64) -> Self {
        Self {
            cash,
            price,
            calls: Vec::new(),
            orders: Vec::new(),
            reject_orders: false,
        }
    }

    pub fn rejecting(mut self) -> Self {
        self.reject_orders = true;
        self
    }
}

impl BrokerPort for MockBroker {
    fn get_cash(&self) -> Result<f64, CrosstraderError> {
        Ok(self.cash)
    }

    fn get_last_price(&self, _symbol: &str) -> Result<f64, CrosstraderError> {
        Ok(self.price)
    }

    fn submit_order(&mut self, intent: &OrderIntent) -> Result<String, CrosstraderError> {
        if self.reject_orders {
            return Err(CrosstraderError::OrderRejected {
                symbol: intent.symbol.clone(),
                reason: "insufficient buying power".into(),
            });
        }
        self.calls
            .push(format!("submit {} {} {}", intent.side, intent.quantity, intent.symbol));
        self.orders.push(intent.clone());
        Ok(format!("mock-{}", self.orders.len()))
    }

    fn close_position(&mut self, symbol: &str) -> Result<(), CrosstraderError> {
        self.calls.push(format!("close {}", symbol));
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(symbol: &str, date: NaiveDate, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000_000,
    }
}

/// Consecutive daily bars starting at `start`.
pub fn bars_from_closes(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(symbol, start + Duration::days(i as i64), close))
        .collect()
}

/// 50 flat closes then a jump: the 20-day average crosses above the
/// 50-day average on the final bar.
pub fn golden_cross_closes() -> Vec<f64> {
    let mut closes = vec![100.0; 50];
    closes.push(200.0);
    closes
}

/// 50 flat closes then a drop: the 20-day average crosses below the
/// 50-day average on the final bar.
pub fn death_cross_closes() -> Vec<f64> {
    let mut closes = vec![100.0; 50];
    closes.push(50.0);
    closes
}

/// 60 falling closes then a spike: the 20-day average starts strictly
/// below the 50-day (150.5 vs 165.5) and ends above it (192.5 vs 181.7).
pub fn strict_golden_cross_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
    closes.push(1000.0);
    closes
}

/// 60 rising closes then a collapse: the 20-day average starts strictly
/// above the 50-day (1049.5 vs 1034.5) and ends below it (997.5 vs 1014.3).
pub fn strict_death_cross_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| 1000.0 + i as f64).collect();
    closes.push(0.0);
    closes
}

pub fn write_csv(dir: &Path, symbol: &str, bars: &[PriceBar]) {
    let mut file = std::fs::File::create(dir.join(format!("{symbol}.csv"))).unwrap();
    writeln!(file, "date,open,high,low,close,volume").unwrap();
    for b in bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            b.date, b.open, b.high, b.low, b.close, b.volume
        )
        .unwrap();
    }
}
