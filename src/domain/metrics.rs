//! Backtest performance summary.

use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ClosedTrade, ExitReason};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    pub total_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub stop_loss_exits: usize,
    pub take_profit_exits: usize,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, risk_free_rate: f64) -> Self {
        let curve = &portfolio.equity_curve;
        let initial = portfolio.initial_capital;

        let final_equity = curve.last().map(|p| p.equity).unwrap_or(initial);
        let total_return = if initial > 0.0 {
            (final_equity - initial) / initial
        } else {
            0.0
        };

        let years = curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return.is_finite() && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(curve);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(curve, risk_free_rate / TRADING_DAYS_PER_YEAR);

        let trades = &portfolio.closed_trades;
        let stats = TradeStats::from_trades(trades);

        Metrics {
            final_equity,
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades: trades.len(),
            long_trades: trades.iter().filter(|t| t.quantity > 0).count(),
            short_trades: trades.iter().filter(|t| t.quantity < 0).count(),
            trades_won: stats.won,
            trades_lost: stats.lost,
            win_rate: if trades.is_empty() {
                0.0
            } else {
                stats.won as f64 / trades.len() as f64
            },
            profit_factor: stats.profit_factor(),
            stop_loss_exits: count_exits(trades, ExitReason::StopLoss),
            take_profit_exits: count_exits(trades, ExitReason::TakeProfit),
        }
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    won: usize,
    lost: usize,
    gross_profit: f64,
    gross_loss: f64,
}

impl TradeStats {
    fn from_trades(trades: &[ClosedTrade]) -> Self {
        trades.iter().fold(TradeStats::default(), |mut s, t| {
            if t.pnl > 0.0 {
                s.won += 1;
                s.gross_profit += t.pnl;
            } else if t.pnl < 0.0 {
                s.lost += 1;
                s.gross_loss += -t.pnl;
            }
            s
        })
    }

    fn profit_factor(&self) -> f64 {
        if self.gross_loss > 0.0 {
            self.gross_profit / self.gross_loss
        } else if self.gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

fn count_exits(trades: &[ClosedTrade], reason: ExitReason) -> usize {
    trades.iter().filter(|t| t.exit_reason == reason).count()
}

/// (max fractional drawdown from peak, longest run of points below peak)
fn compute_drawdown(curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut run = 0i64;
    let mut max_run = 0i64;

    for point in curve {
        if point.equity > peak {
            peak = point.equity;
            run = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            run += 1;
            max_run = max_run.max(run);
        }
    }

    (max_dd, max_run)
}

/// Annualised (sharpe, sortino) from daily equity returns.
fn compute_risk_adjusted(curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    let returns: Vec<f64> = curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                (w[1].equity - w[0].equity) / w[0].equity
            } else {
                0.0
            }
        })
        .collect();

    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let excess = mean - daily_rf;

    let downside = (returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let annualise = TRADING_DAYS_PER_YEAR.sqrt();
    let sharpe = if stddev > 0.0 { excess / stddev * annualise } else { 0.0 };
    let sortino = if downside > 0.0 { excess / downside * annualise } else { 0.0 };

    (sharpe, sortino)
}
