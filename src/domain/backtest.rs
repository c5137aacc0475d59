//! Historical replay of the strategy.
//!
//! One tick per bar inside `[start_date, end_date]`: the simulated account is
//! marked to the bar's close, bracket exits are checked, then the strategy
//! iteration runs against a history view ending at that bar.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::error::CrosstraderError;
use super::execution::{check_bracket, enter_position, exit_position, ExecutionConfig};
use super::ohlcv::PriceBar;
use super::order::OrderIntent;
use super::portfolio::Portfolio;
use super::position::ExitReason;
use super::strategy::{run_iteration, IterationOutcome, StrategyParams};
use super::trade_state::TradeState;
use crate::ports::broker_port::BrokerPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub outcomes: Vec<IterationOutcome>,
    pub final_state: TradeState,
    pub rejected_orders: usize,
}

impl BacktestResult {
    pub fn orders_submitted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.order_id.is_some()).count()
    }
}

/// Simulated broker over a [`Portfolio`], quoting the current bar's close.
#[derive(Debug)]
pub struct ReplayBroker {
    pub portfolio: Portfolio,
    config: ExecutionConfig,
    date: Option<NaiveDate>,
    price: f64,
    next_order_id: u64,
}

impl ReplayBroker {
    pub fn new(initial_capital: f64, config: ExecutionConfig) -> Self {
        ReplayBroker {
            portfolio: Portfolio::new(initial_capital),
            config,
            date: None,
            price: 0.0,
            next_order_id: 1,
        }
    }

    pub fn mark(&mut self, date: NaiveDate, price: f64) {
        self.date = Some(date);
        self.price = price;
    }

    fn current_date(&self) -> Result<NaiveDate, CrosstraderError> {
        self.date.ok_or_else(|| CrosstraderError::Broker {
            reason: "replay broker has not been marked to a bar".into(),
        })
    }

    pub fn check_bracket(&mut self) {
        let Some(date) = self.date else { return };
        if let Some(trade) = check_bracket(&mut self.portfolio, self.price, date, &self.config) {
            info!(
                symbol = %trade.symbol,
                %date,
                reason = %trade.exit_reason,
                pnl = trade.pnl,
                "bracket exit"
            );
        }
    }

    pub fn equity(&self) -> f64 {
        self.portfolio.total_equity(self.price)
    }

    pub fn close_out(&mut self) {
        let Some(date) = self.date else { return };
        exit_position(&mut self.portfolio, self.price, date, ExitReason::EndOfBacktest, &self.config);
    }
}

impl BrokerPort for ReplayBroker {
    fn get_cash(&self) -> Result<f64, CrosstraderError> {
        Ok(self.portfolio.cash)
    }

    fn get_last_price(&self, _symbol: &str) -> Result<f64, CrosstraderError> {
        self.current_date()?;
        Ok(self.price)
    }

    fn submit_order(&mut self, intent: &OrderIntent) -> Result<String, CrosstraderError> {
        let date = self.current_date()?;
        enter_position(&mut self.portfolio, intent, self.price, date, &self.config).map_err(|e| {
            CrosstraderError::OrderRejected {
                symbol: intent.symbol.clone(),
                reason: e.to_string(),
            }
        })?;
        let id = format!("replay-{}", self.next_order_id);
        self.next_order_id += 1;
        Ok(id)
    }

    fn close_position(&mut self, _symbol: &str) -> Result<(), CrosstraderError> {
        let date = self.current_date()?;
        exit_position(&mut self.portfolio, self.price, date, ExitReason::Closed, &self.config);
        Ok(())
    }
}

/// History view that never exposes bars after the current tick.
pub struct ReplayData<'a> {
    bars: &'a [PriceBar],
}

impl<'a> ReplayData<'a> {
    pub fn new(bars: &'a [PriceBar]) -> Self {
        ReplayData { bars }
    }
}

impl MarketDataPort for ReplayData<'_> {
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, CrosstraderError> {
        Ok(self
            .bars
            .iter()
            .filter(|b| b.symbol == symbol && b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }
}

/// Replay `bars` (ascending, one symbol) through the strategy.
///
/// A rejected order is logged and skipped with the trade state unchanged;
/// any other error aborts the run.
pub fn run_backtest(
    bars: &[PriceBar],
    params: &StrategyParams,
    config: &BacktestConfig,
) -> Result<BacktestResult, CrosstraderError> {
    let mut broker = ReplayBroker::new(config.initial_capital, config.execution.clone());
    let mut state = TradeState::new();
    let mut outcomes = Vec::new();
    let mut rejected_orders = 0;

    for (i, bar) in bars.iter().enumerate() {
        if bar.date < config.start_date || bar.date > config.end_date {
            continue;
        }

        broker.mark(bar.date, bar.close);
        broker.check_bracket();

        let data = ReplayData::new(&bars[..=i]);
        match run_iteration(params, state, bar.date, &data, &mut broker) {
            Ok(outcome) => {
                state = outcome.state;
                outcomes.push(outcome);
            }
            Err(CrosstraderError::OrderRejected { symbol, reason }) => {
                warn!(%symbol, date = %bar.date, %reason, "order rejected");
                rejected_orders += 1;
            }
            Err(e) => return Err(e),
        }

        let equity = broker.equity();
        broker.portfolio.record_equity(bar.date, equity);
    }

    broker.close_out();

    Ok(BacktestResult {
        portfolio: broker.portfolio,
        outcomes,
        final_state: state,
        rejected_orders,
    })
}
