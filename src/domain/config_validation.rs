//! Configuration validation.
//!
//! Checks every configured value before a backtest or live run starts.
//! Missing optional keys fall back to their defaults and are not errors.

use crate::domain::error::CrosstraderError;
use crate::domain::position_manager::DEFAULT_CASH_AT_RISK;
use crate::domain::signal::{DEFAULT_FAST_WINDOW, DEFAULT_SLOW_WINDOW};
use crate::domain::strategy::DEFAULT_LOOKBACK_DAYS;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// Ten years of calendar days.
pub const MAX_LOOKBACK_DAYS: i64 = 3_650;
pub const MAX_SLEEP_HOURS: i64 = 24 * 7;

/// Weekend and market-holiday allowance on top of the trading-day estimate.
const HOLIDAY_MARGIN_DAYS: i64 = 10;

/// Calendar days needed to expect `slow + 1` daily bars: five trading days
/// per seven calendar days, plus a holiday margin. This is an estimate;
/// a short fetch still yields a hold, not an error.
pub fn min_lookback_days(slow: i64) -> i64 {
    (slow + 1) * 7 / 5 + HOLIDAY_MARGIN_DAYS
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    validate_symbol(config)?;
    validate_cash_at_risk(config)?;
    validate_windows(config)?;
    validate_bracket(config)?;
    validate_sleep_hours(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    validate_dates(config)?;
    validate_initial_capital(config)?;
    validate_costs(config)?;
    validate_risk_free_rate(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> CrosstraderError {
    CrosstraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn finite(section: &str, key: &str, value: f64) -> Result<f64, CrosstraderError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(section, key, &format!("{} must be a finite number", key)))
    }
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    match config.get_string("strategy", "symbol") {
        Some(s) if s.trim().is_empty() => Err(invalid("strategy", "symbol", "symbol must not be empty")),
        Some(s) if !s.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '.') => Err(invalid(
            "strategy",
            "symbol",
            "symbol must be alphanumeric",
        )),
        _ => Ok(()),
    }
}

fn validate_cash_at_risk(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = finite(
        "strategy",
        "cash_at_risk",
        config.get_double("strategy", "cash_at_risk", DEFAULT_CASH_AT_RISK),
    )?;
    if value <= 0.0 || value > 1.0 {
        return Err(invalid("strategy", "cash_at_risk", "cash_at_risk must be in (0, 1]"));
    }
    Ok(())
}

fn validate_windows(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let fast = config.get_int("strategy", "fast_window", DEFAULT_FAST_WINDOW as i64);
    let slow = config.get_int("strategy", "slow_window", DEFAULT_SLOW_WINDOW as i64);
    let lookback = config.get_int("strategy", "lookback_days", DEFAULT_LOOKBACK_DAYS);

    if fast < 1 {
        return Err(invalid("strategy", "fast_window", "fast_window must be at least 1"));
    }
    if slow <= fast {
        return Err(invalid("strategy", "slow_window", "slow_window must be greater than fast_window"));
    }
    let min_lookback = min_lookback_days(slow);
    if lookback < min_lookback {
        return Err(invalid(
            "strategy",
            "lookback_days",
            &format!(
                "lookback_days must be at least {} to span slow_window + 1 trading days",
                min_lookback
            ),
        ));
    }
    if lookback > MAX_LOOKBACK_DAYS {
        return Err(invalid(
            "strategy",
            "lookback_days",
            &format!("lookback_days must be at most {}", MAX_LOOKBACK_DAYS),
        ));
    }
    Ok(())
}

fn validate_bracket(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let ratio = |key: &str, default: f64| finite("strategy", key, config.get_double("strategy", key, default));
    let long_tp = ratio("long_take_profit", 1.50)?;
    let long_sl = ratio("long_stop_loss", 0.95)?;
    let short_tp = ratio("short_take_profit", 0.80)?;
    let short_sl = ratio("short_stop_loss", 1.05)?;

    if long_tp <= 1.0 {
        return Err(invalid("strategy", "long_take_profit", "long_take_profit must be above 1"));
    }
    if long_sl <= 0.0 || long_sl >= 1.0 {
        return Err(invalid("strategy", "long_stop_loss", "long_stop_loss must be in (0, 1)"));
    }
    if short_tp <= 0.0 || short_tp >= 1.0 {
        return Err(invalid("strategy", "short_take_profit", "short_take_profit must be in (0, 1)"));
    }
    if short_sl <= 1.0 {
        return Err(invalid("strategy", "short_stop_loss", "short_stop_loss must be above 1"));
    }
    Ok(())
}

fn validate_sleep_hours(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let hours = config.get_int("strategy", "sleep_hours", 24);
    if !(1..=MAX_SLEEP_HOURS).contains(&hours) {
        return Err(invalid(
            "strategy",
            "sleep_hours",
            &format!("sleep_hours must be between 1 and {}", MAX_SLEEP_HOURS),
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    if start > end {
        return Err(invalid("backtest", "start_date", "start_date must not be after end_date"));
    }
    Ok(())
}

pub fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, CrosstraderError> {
    let value = config
        .get_string("backtest", key)
        .ok_or_else(|| CrosstraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: key.to_string(),
        })?;
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        invalid(
            "backtest",
            key,
            &format!("invalid {} format, expected YYYY-MM-DD", key),
        )
    })
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let capital = finite(
        "backtest",
        "initial_capital",
        config.get_double("backtest", "initial_capital", 100_000.0),
    )?;
    if capital <= 0.0 {
        return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
    }
    Ok(())
}

fn validate_costs(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    for key in ["commission_per_trade", "commission_pct", "slippage_pct"] {
        if finite("backtest", key, config.get_double("backtest", key, 0.0))? < 0.0 {
            return Err(invalid("backtest", key, &format!("{} must be non-negative", key)));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.05);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid("backtest", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
    }
    Ok(())
}
