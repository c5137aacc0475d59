//! Strategy parameters and the per-tick trading iteration.

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::domain::error::CrosstraderError;
use crate::domain::position_manager::{decide, Decision, PositionParams};
use crate::domain::signal::{evaluate, CrossoverWindows, SignalReading};
use crate::domain::trade_state::TradeState;
use crate::ports::broker_port::BrokerPort;
use crate::ports::data_port::MarketDataPort;

pub const DEFAULT_SYMBOL: &str = "AAPL";
pub const DEFAULT_LOOKBACK_DAYS: i64 = 201;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub symbol: String,
    pub windows: CrossoverWindows,
    pub position: PositionParams,
    /// Calendar days of history requested per tick.
    pub lookback_days: i64,
}

impl StrategyParams {
    pub fn new(symbol: &str) -> Self {
        StrategyParams {
            symbol: symbol.to_uppercase(),
            windows: CrossoverWindows::default(),
            position: PositionParams::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOL)
    }
}

/// First date of a `lookback_days` window ending at `date`.
pub fn history_start(date: NaiveDate, lookback_days: i64) -> Result<NaiveDate, CrosstraderError> {
    Duration::try_days(lookback_days)
        .and_then(|span| date.checked_sub_signed(span))
        .ok_or_else(|| CrosstraderError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "lookback_days".to_string(),
            reason: format!("{} days before {} is out of range", lookback_days, date),
        })
}

/// Everything one iteration observed and did.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub date: NaiveDate,
    pub cash: f64,
    pub price: f64,
    pub reading: SignalReading,
    pub decision: Decision,
    pub state: TradeState,
    pub order_id: Option<String>,
}

/// Run one scheduled decision for `date`.
///
/// Reads cash and last price, fetches `lookback_days` of history ending at
/// `date`, evaluates the crossover, and submits the resulting bracket order
/// (closing the opposite position first when flipping). The returned state
/// only reflects an order once the broker has accepted it; any error leaves
/// the caller's state untouched.
pub fn run_iteration(
    params: &StrategyParams,
    state: TradeState,
    date: NaiveDate,
    data: &dyn MarketDataPort,
    broker: &mut dyn BrokerPort,
) -> Result<IterationOutcome, CrosstraderError> {
    let symbol = params.symbol.as_str();
    let cash = broker.get_cash()?;
    let price = broker.get_last_price(symbol)?;

    let reading = if cash > price {
        let start = history_start(date, params.lookback_days)?;
        let history = data.fetch_history(symbol, start, date)?;
        if history.is_empty() {
            return Err(CrosstraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no bars between {} and {}", start, date),
            });
        }
        if history.len() < params.windows.min_bars() {
            warn!(
                symbol,
                %date,
                bars = history.len(),
                needed = params.windows.min_bars(),
                "insufficient history for crossover"
            );
        }
        debug!(symbol, %date, bars = history.len(), "history fetched");
        evaluate(&history, params.windows)
    } else {
        SignalReading::default()
    };

    let (next, decision) = decide(state, &reading, symbol, cash, price, &params.position);

    let order_id = match &decision {
        Decision::Hold(_) => None,
        Decision::Open {
            intent,
            close_existing,
        } => {
            if *close_existing {
                info!(symbol, %date, "closing existing position");
                broker.close_position(symbol)?;
            }
            Some(broker.submit_order(intent)?)
        }
    };

    info!(
        symbol,
        %date,
        cash,
        price,
        fast = ?reading.fast,
        slow = ?reading.slow,
        buy = reading.buy,
        sell = reading.sell,
        %decision,
        last_trade = %next.last_trade,
        "decision"
    );

    Ok(IterationOutcome {
        date,
        cash,
        price,
        reading,
        decision,
        state: next,
        order_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use crate::domain::order::{OrderIntent, OrderSide};
    use crate::domain::position_manager::HoldReason;
    use crate::domain::trade_state::LastTrade;
    use std::cell::RefCell;

    struct FixedData {
        bars: Vec<PriceBar>,
        requested: RefCell<Vec<(NaiveDate, NaiveDate)>>,
    }

    impl MarketDataPort for FixedData {
        fn fetch_history(
            &self,
            _symbol: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PriceBar>, CrosstraderError> {
            self.requested.borrow_mut().push((start, end));
            Ok(self.bars.clone())
        }
    }

    #[derive(Default)]
    struct RecordingBroker {
        cash: f64,
        price: f64,
        calls: Vec<String>,
        reject: bool,
    }

    impl BrokerPort for RecordingBroker {
        fn get_cash(&self) -> Result<f64, CrosstraderError> {
            Ok(self.cash)
        }

        fn get_last_price(&self, _symbol: &str) -> Result<f64, CrosstraderError> {
            Ok(self.price)
        }

        fn submit_order(&mut self, intent: &OrderIntent) -> Result<String, CrosstraderError> {
            if self.reject {
                return Err(CrosstraderError::OrderRejected {
                    symbol: intent.symbol.clone(),
                    reason: "insufficient buying power".into(),
                });
            }
            self.calls.push(format!("submit {} {}", intent.side, intent.quantity));
            Ok(format!("order-{}", self.calls.len()))
        }

        fn close_position(&mut self, symbol: &str) -> Result<(), CrosstraderError> {
            self.calls.push(format!("close {}", symbol));
            Ok(())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 6, 1).unwrap()
    }

    fn crossing_up() -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let mut closes = vec![100.0; 50];
        closes.push(200.0);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                symbol: "AAPL".into(),
                date: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn data(bars: Vec<PriceBar>) -> FixedData {
        FixedData {
            bars,
            requested: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn requests_lookback_window_ending_today() {
        let data = data(crossing_up());
        let mut broker = RecordingBroker {
            cash: 10_000.0,
            price: 100.0,
            ..Default::default()
        };
        run_iteration(&StrategyParams::default(), TradeState::new(), date(), &data, &mut broker).unwrap();

        let requested = data.requested.borrow();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].0, date() - Duration::days(201));
        assert_eq!(requested[0].1, date());
    }

    #[test]
    fn buy_submits_order_and_updates_state() {
        let data = data(crossing_up());
        let mut broker = RecordingBroker {
            cash: 10_000.0,
            price: 100.0,
            ..Default::default()
        };
        let outcome =
            run_iteration(&StrategyParams::default(), TradeState::new(), date(), &data, &mut broker).unwrap();

        assert_eq!(outcome.state.last_trade, LastTrade::Buy);
        assert_eq!(outcome.order_id.as_deref(), Some("order-1"));
        assert_eq!(broker.calls, vec!["submit buy 50"]);
    }

    #[test]
    fn flip_closes_before_submitting() {
        let data = data(crossing_up());
        let mut broker = RecordingBroker {
            cash: 10_000.0,
            price: 100.0,
            ..Default::default()
        };
        let state = TradeState::with_last_trade(LastTrade::Sell);
        run_iteration(&StrategyParams::default(), state, date(), &data, &mut broker).unwrap();

        assert_eq!(broker.calls, vec!["close AAPL", "submit buy 50"]);
    }

    #[test]
    fn rejected_order_propagates() {
        let data = data(crossing_up());
        let mut broker = RecordingBroker {
            cash: 10_000.0,
            price: 100.0,
            reject: true,
            ..Default::default()
        };
        let err = run_iteration(&StrategyParams::default(), TradeState::new(), date(), &data, &mut broker)
            .unwrap_err();
        assert!(matches!(err, CrosstraderError::OrderRejected { .. }));
    }

    #[test]
    fn empty_history_is_data_unavailable() {
        let data = data(Vec::new());
        let mut broker = RecordingBroker {
            cash: 10_000.0,
            price: 100.0,
            ..Default::default()
        };
        let err = run_iteration(&StrategyParams::default(), TradeState::new(), date(), &data, &mut broker)
            .unwrap_err();
        assert!(matches!(err, CrosstraderError::DataUnavailable { .. }));
    }

    #[test]
    fn short_history_holds() {
        let data = data(crossing_up()[..30].to_vec());
        let mut broker = RecordingBroker {
            cash: 10_000.0,
            price: 100.0,
            ..Default::default()
        };
        let outcome =
            run_iteration(&StrategyParams::default(), TradeState::new(), date(), &data, &mut broker).unwrap();
        assert_eq!(outcome.decision, Decision::Hold(HoldReason::NoSignal));
        assert!(broker.calls.is_empty());
    }

    #[test]
    fn low_cash_skips_history_fetch() {
        let data = data(crossing_up());
        let mut broker = RecordingBroker {
            cash: 50.0,
            price: 100.0,
            ..Default::default()
        };
        let outcome =
            run_iteration(&StrategyParams::default(), TradeState::new(), date(), &data, &mut broker).unwrap();

        assert_eq!(outcome.decision, Decision::Hold(HoldReason::InsufficientCash));
        assert!(data.requested.borrow().is_empty());
    }

    #[test]
    fn unrepresentable_lookback_is_config_error() {
        let data = data(crossing_up());
        let mut broker = RecordingBroker {
            cash: 10_000.0,
            price: 100.0,
            ..Default::default()
        };
        for lookback_days in [999_999_999_999, i64::MAX] {
            let params = StrategyParams {
                lookback_days,
                ..StrategyParams::default()
            };
            let err = run_iteration(&params, TradeState::new(), date(), &data, &mut broker).unwrap_err();
            assert!(matches!(err, CrosstraderError::ConfigInvalid { ref key, .. } if key == "lookback_days"));
        }
        assert!(data.requested.borrow().is_empty());
        assert!(broker.calls.is_empty());
    }

    #[test]
    fn history_start_counts_calendar_days() {
        assert_eq!(
            history_start(date(), 201).unwrap(),
            NaiveDate::from_ymd_opt(2021, 11, 12).unwrap()
        );
    }

    #[test]
    fn params_uppercase_symbol() {
        let params = StrategyParams::new("msft");
        assert_eq!(params.symbol, "MSFT");
        assert_eq!(params.lookback_days, 201);
        assert_eq!(params.windows, CrossoverWindows::default());
    }

    #[test]
    fn outcome_records_intent_side() {
        let data = data(crossing_up());
        let mut broker = RecordingBroker {
            cash: 10_000.0,
            price: 100.0,
            ..Default::default()
        };
        let outcome =
            run_iteration(&StrategyParams::default(), TradeState::new(), date(), &data, &mut broker).unwrap();
        match outcome.decision {
            Decision::Open { intent, .. } => assert_eq!(intent.side, OrderSide::Buy),
            other => panic!("expected open, got {other:?}"),
        }
    }
}
