//! CSV file data adapter.
//!
//! One file per symbol, `{base_path}/{SYMBOL}.csv`, with a header row
//! `date,open,high,low,close,volume`.

use crate::domain::error::CrosstraderError;
use crate::domain::ohlcv::{normalize, PriceBar};
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.to_uppercase()))
    }

    /// Every bar in the symbol's file, ascending and de-duplicated.
    pub fn load_all(&self, symbol: &str) -> Result<Vec<PriceBar>, CrosstraderError> {
        let path = self.csv_path(symbol);
        let unavailable = |reason: String| CrosstraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;
            // Accept bare dates and ISO timestamps such as 2022-01-03T05:00:00Z.
            let date_part = row.date.get(..10).unwrap_or(&row.date);
            let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
                unavailable(format!("invalid date on row {}: {}", line + 1, e))
            })?;

            bars.push(PriceBar {
                symbol: symbol.to_uppercase(),
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume as i64,
            });
        }

        debug!(path = %path.display(), bars = bars.len(), "loaded csv");
        Ok(normalize(bars))
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, CrosstraderError> {
        let mut bars = self.load_all(symbol)?;
        bars.retain(|b| b.date >= start && b.date <= end);
        Ok(bars)
    }
}
