//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod trade_state;
pub mod order;
pub mod position_manager;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
