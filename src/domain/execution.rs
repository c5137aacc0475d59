//! Simulated fills for bracket orders.
//!
//! Entry and exit with slippage and commissions, and bracket trigger checks
//! against the current price. Short entries escrow their notional in the
//! same way long entries spend it.

use chrono::NaiveDate;

use super::order::{OrderIntent, OrderSide};
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, ExitReason, Position};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// flat_fee + (trade_value * pct / 100)
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Buying pays up, selling receives less.
pub fn apply_slippage(market_price: f64, side: OrderSide, slippage_pct: f64) -> f64 {
    match side {
        OrderSide::Buy => market_price * (1.0 + slippage_pct / 100.0),
        OrderSide::Sell => market_price * (1.0 - slippage_pct / 100.0),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FillError {
    #[error("a position is already open")]
    PositionOpen,
    #[error("quantity must be positive")]
    ZeroQuantity,
    #[error("insufficient capital: need {required:.2}, have {available:.2}")]
    InsufficientCapital { required: f64, available: f64 },
}

/// Fill a bracket entry at `market_price`.
///
/// Bracket levels are rebased onto the execution price by the same ratio
/// the intent used against the quoted price.
pub fn enter_position(
    portfolio: &mut Portfolio,
    intent: &OrderIntent,
    market_price: f64,
    date: NaiveDate,
    config: &ExecutionConfig,
) -> Result<Position, FillError> {
    if portfolio.has_position() {
        return Err(FillError::PositionOpen);
    }
    if intent.quantity == 0 {
        return Err(FillError::ZeroQuantity);
    }

    let execution_price = apply_slippage(market_price, intent.side, config.slippage_pct);
    let qty = intent.quantity as f64;
    let cost = qty * execution_price;
    let commission = calculate_commission(cost, config);
    let total_cost = cost + commission;

    if total_cost > portfolio.cash {
        return Err(FillError::InsufficientCapital {
            required: total_cost,
            available: portfolio.cash,
        });
    }

    portfolio.cash -= total_cost;

    let rebase = if market_price > 0.0 {
        execution_price / market_price
    } else {
        1.0
    };
    let quantity = match intent.side {
        OrderSide::Buy => intent.quantity as i64,
        OrderSide::Sell => -(intent.quantity as i64),
    };

    let position = Position {
        symbol: intent.symbol.clone(),
        quantity,
        entry_price: execution_price,
        entry_date: date,
        entry_commission: commission,
        stop_loss: intent.stop_loss_price * rebase,
        take_profit: intent.take_profit_price * rebase,
    };

    portfolio.position = Some(position.clone());
    Ok(position)
}

/// Close the open position at `market_price`. `None` when flat.
///
/// PnL includes both entry and exit commissions.
pub fn exit_position(
    portfolio: &mut Portfolio,
    market_price: f64,
    exit_date: NaiveDate,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<ClosedTrade> {
    let position = portfolio.position.take()?;

    let exit_side = if position.is_long() {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    };
    let exit_price = apply_slippage(market_price, exit_side, config.slippage_pct);

    let exit_value = position.quantity.unsigned_abs() as f64 * exit_price;
    let exit_commission = calculate_commission(exit_value, config);
    let pnl = position.unrealized_pnl(exit_price) - position.entry_commission - exit_commission;

    portfolio.cash += position.settlement_value(exit_price) - exit_commission;

    let trade = ClosedTrade {
        symbol: position.symbol,
        quantity: position.quantity,
        entry_price: position.entry_price,
        exit_price,
        entry_date: position.entry_date,
        exit_date,
        pnl,
        exit_reason: reason,
    };

    portfolio.record_trade(trade.clone());
    Some(trade)
}

/// Exit the open position if `price` has reached its stop loss or take profit.
pub fn check_bracket(
    portfolio: &mut Portfolio,
    price: f64,
    date: NaiveDate,
    config: &ExecutionConfig,
) -> Option<ClosedTrade> {
    let reason = portfolio.position.as_ref()?.bracket_exit(price)?;
    exit_position(portfolio, price, date, reason, config)
}
