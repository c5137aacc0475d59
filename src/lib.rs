//! crosstrader: moving-average crossover trading strategy.
//!
//! Hexagonal architecture: decision logic in [`domain`], collaborator traits in
//! [`ports`], concrete brokers and data sources in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
