//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{parse_date, validate_backtest_config, validate_strategy_config};
use crate::domain::error::CrosstraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::indicator::IndicatorType;
use crate::domain::metrics::Metrics;
use crate::domain::order::BracketParams;
use crate::domain::position_manager::{PositionParams, DEFAULT_CASH_AT_RISK};
use crate::domain::signal::{evaluate, CrossoverWindows, DEFAULT_FAST_WINDOW, DEFAULT_SLOW_WINDOW};
use crate::domain::strategy::{history_start, StrategyParams, DEFAULT_LOOKBACK_DAYS, DEFAULT_SYMBOL};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_SLEEP_HOURS: i64 = 24;

#[derive(Parser, Debug)]
#[command(name = "crosstrader", about = "Moving-average crossover trader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the strategy over CSV history
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Show the crossover reading for one date
    Signal {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        /// Defaults to the last bar in the data file
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Trade against the broker configured in the environment
    Trade {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        /// Run a single iteration and exit
        #[arg(long)]
        once: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbol,
        } => run_backtest_command(&config, data_dir, symbol.as_deref()),
        Command::Signal {
            config,
            data_dir,
            symbol,
            date,
        } => run_signal(config.as_deref(), data_dir, symbol.as_deref(), date),
        Command::Trade {
            config,
            symbol,
            once,
        } => run_trade(config.as_deref(), symbol.as_deref(), once),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CrosstraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

fn load_optional_config(path: Option<&Path>) -> Result<FileConfigAdapter, CrosstraderError> {
    match path {
        Some(p) => load_config(p),
        None => Ok(FileConfigAdapter::empty()),
    }
}

/// Strategy parameters from `[strategy]`, with defaults for absent keys.
pub fn build_strategy_params(config: &dyn ConfigPort, symbol_override: Option<&str>) -> StrategyParams {
    let symbol = symbol_override
        .map(str::to_string)
        .or_else(|| config.get_string("strategy", "symbol"))
        .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
    let bracket = BracketParams::default();

    StrategyParams {
        windows: CrossoverWindows {
            fast: config.get_int("strategy", "fast_window", DEFAULT_FAST_WINDOW as i64) as usize,
            slow: config.get_int("strategy", "slow_window", DEFAULT_SLOW_WINDOW as i64) as usize,
        },
        position: PositionParams {
            cash_at_risk: config.get_double("strategy", "cash_at_risk", DEFAULT_CASH_AT_RISK),
            bracket: BracketParams {
                long_take_profit: config.get_double("strategy", "long_take_profit", bracket.long_take_profit),
                long_stop_loss: config.get_double("strategy", "long_stop_loss", bracket.long_stop_loss),
                short_take_profit: config.get_double("strategy", "short_take_profit", bracket.short_take_profit),
                short_stop_loss: config.get_double("strategy", "short_stop_loss", bracket.short_stop_loss),
            },
        },
        lookback_days: config.get_int("strategy", "lookback_days", DEFAULT_LOOKBACK_DAYS),
        ..StrategyParams::new(&symbol)
    }
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, CrosstraderError> {
    let defaults = ExecutionConfig::default();
    Ok(BacktestConfig {
        start_date: parse_date(config, "start_date")?,
        end_date: parse_date(config, "end_date")?,
        initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
        execution: ExecutionConfig {
            commission_per_trade: config.get_double("backtest", "commission_per_trade", defaults.commission_per_trade),
            commission_pct: config.get_double("backtest", "commission_pct", defaults.commission_pct),
            slippage_pct: config.get_double("backtest", "slippage_pct", defaults.slippage_pct),
        },
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.05),
    })
}

pub fn resolve_data_dir(config: &dyn ConfigPort, data_dir_override: Option<PathBuf>) -> PathBuf {
    data_dir_override
        .or_else(|| config.get_string("backtest", "data_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn run_backtest_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    symbol: Option<&str>,
) -> Result<(), CrosstraderError> {
    let config = load_config(config_path)?;
    validate_strategy_config(&config)?;
    validate_backtest_config(&config)?;

    let params = build_strategy_params(&config, symbol);
    let bt_config = build_backtest_config(&config)?;
    let data_dir = resolve_data_dir(&config, data_dir);

    let bars = CsvAdapter::new(data_dir.clone()).load_all(&params.symbol)?;
    if !bars
        .iter()
        .any(|b| b.date >= bt_config.start_date && b.date <= bt_config.end_date)
    {
        return Err(CrosstraderError::DataUnavailable {
            symbol: params.symbol.clone(),
            reason: format!(
                "no bars between {} and {} in {}",
                bt_config.start_date,
                bt_config.end_date,
                data_dir.display()
            ),
        });
    }

    info!(
        symbol = %params.symbol,
        start = %bt_config.start_date,
        end = %bt_config.end_date,
        bars = bars.len(),
        "running backtest"
    );
    let result = run_backtest(&bars, &params, &bt_config)?;
    let metrics = Metrics::compute(&result.portfolio, bt_config.risk_free_rate);
    print_summary(&params, &bt_config, &result, &metrics);
    Ok(())
}

fn print_summary(params: &StrategyParams, config: &BacktestConfig, result: &BacktestResult, metrics: &Metrics) {
    println!("=== {} {}/{} crossover ===", params.symbol, params.windows.fast, params.windows.slow);
    println!("Period:           {} to {}", config.start_date, config.end_date);
    println!("Initial Capital:  {:.2}", config.initial_capital);
    println!("Final Equity:     {:.2}", metrics.final_equity);
    println!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    println!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    println!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    println!(
        "Max Drawdown:     -{:.1}% ({} days)",
        metrics.max_drawdown * 100.0,
        metrics.max_drawdown_duration
    );
    println!("Orders Submitted: {}", result.orders_submitted());
    if result.rejected_orders > 0 {
        println!("Orders Rejected:  {}", result.rejected_orders);
    }
    println!(
        "Total Trades:     {} ({} long, {} short)",
        metrics.total_trades, metrics.long_trades, metrics.short_trades
    );
    println!(
        "Bracket Exits:    {} stop loss, {} take profit",
        metrics.stop_loss_exits, metrics.take_profit_exits
    );
    println!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", metrics.profit_factor);
    println!("Last Trade:       {}", result.final_state.last_trade);
}

fn run_signal(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
    symbol: Option<&str>,
    date: Option<NaiveDate>,
) -> Result<(), CrosstraderError> {
    let config = load_optional_config(config_path)?;
    validate_strategy_config(&config)?;

    let params = build_strategy_params(&config, symbol);
    let adapter = CsvAdapter::new(resolve_data_dir(&config, data_dir));
    let date = match date {
        Some(d) => d,
        None => adapter
            .load_all(&params.symbol)?
            .last()
            .map(|b| b.date)
            .ok_or_else(|| CrosstraderError::DataUnavailable {
                symbol: params.symbol.clone(),
                reason: "data file has no bars".into(),
            })?,
    };

    let start = history_start(date, params.lookback_days)?;
    let history = adapter.fetch_history(&params.symbol, start, date)?;
    if history.is_empty() {
        return Err(CrosstraderError::DataUnavailable {
            symbol: params.symbol.clone(),
            reason: format!("no bars between {} and {}", start, date),
        });
    }
    let reading = evaluate(&history, params.windows);

    let fmt_ma = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
    println!("{} {}", params.symbol, date);
    println!("  bars:          {}", history.len());
    println!("  {:<14} {}", format!("{}:", IndicatorType::Sma(params.windows.fast)), fmt_ma(reading.fast));
    println!("  {:<14} {}", format!("{}:", IndicatorType::Sma(params.windows.slow)), fmt_ma(reading.slow));
    println!("  buy:           {}", reading.buy);
    println!("  sell:          {}", reading.sell);
    Ok(())
}

fn run_trade(config_path: Option<&Path>, symbol: Option<&str>, once: bool) -> Result<(), CrosstraderError> {
    let config = load_optional_config(config_path)?;
    validate_strategy_config(&config)?;
    let params = build_strategy_params(&config, symbol);
    let sleep_hours = config.get_int("strategy", "sleep_hours", DEFAULT_SLEEP_HOURS) as u64;

    #[cfg(feature = "alpaca")]
    {
        use crate::adapters::alpaca::AlpacaClient;
        use crate::adapters::credentials::Credentials;
        use crate::domain::strategy::run_iteration;
        use crate::domain::trade_state::TradeState;
        use chrono::Local;

        let credentials = Credentials::from_env()?;
        let data = AlpacaClient::new(&credentials)?;
        let mut broker = AlpacaClient::new(&credentials)?;
        info!(symbol = %params.symbol, base_url = %credentials.base_url, once, "starting trader");

        let mut state = TradeState::new();
        loop {
            let today = Local::now().date_naive();
            match run_iteration(&params, state, today, &data, &mut broker) {
                Ok(outcome) => state = outcome.state,
                Err(e) if once => return Err(e),
                Err(e) => error!(date = %today, "iteration failed: {e}"),
            }
            if once {
                return Ok(());
            }
            info!(hours = sleep_hours, "sleeping until next iteration");
            std::thread::sleep(std::time::Duration::from_secs(sleep_hours * 3600));
        }
    }

    #[cfg(not(feature = "alpaca"))]
    {
        let _ = (params, sleep_hours, once);
        Err(CrosstraderError::Broker {
            reason: "alpaca feature is required for trade".into(),
        })
    }
}

fn run_validate(config_path: &Path) -> Result<(), CrosstraderError> {
    let config = load_config(config_path)?;
    validate_strategy_config(&config)?;

    let has_backtest = config.get_string("backtest", "start_date").is_some()
        || config.get_string("backtest", "end_date").is_some();
    if has_backtest {
        validate_backtest_config(&config)?;
    }

    let params = build_strategy_params(&config, None);
    println!("Configuration is valid.");
    println!(
        "  {} SMA({}/{}), cash at risk {:.0}%, lookback {} days",
        params.symbol,
        params.windows.fast,
        params.windows.slow,
        params.position.cash_at_risk * 100.0,
        params.lookback_days
    );
    if has_backtest {
        let bt = build_backtest_config(&config)?;
        println!("  backtest {} to {}, capital {:.2}", bt.start_date, bt.end_date, bt.initial_capital);
    }
    Ok(())
}
