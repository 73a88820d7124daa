//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvBarAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_backtest, run_holdout, BacktestResult};
use crate::domain::bar::{validate_bars, Bar};
use crate::domain::config_validation::{
    parse_double, parse_double_list, parse_int, require_double, validate_analysis_config,
    validate_replay_config, validate_strategy_config,
};
use crate::domain::error::AtrtraderError;
use crate::domain::replay::{ReplayRunner, ReplaySummary, DEFAULT_LOOKBACK};
use crate::domain::robustness::{
    run_robustness, RobustnessResult, DEFAULT_SL_MULTIPLIERS, DEFAULT_TP_MULTIPLIERS,
};
use crate::domain::simulator::SimulatorConfig;
use crate::domain::trades::{expectancy, extract_trades, EdgeMetrics, TradeRecord, TradeStats};
use crate::domain::walk_forward::{run_walk_forward, summarize, WindowResult};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::BarSource;
use crate::ports::filter_port::{AllowAll, FilterGate};
use crate::ports::signal_port::PrecomputedSignals;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_IN_SAMPLE_DAYS: u32 = 90;
pub const DEFAULT_OUT_OF_SAMPLE_DAYS: u32 = 30;
pub const DEFAULT_TRAIN_PCT: f64 = 0.7;
pub const LOG_ENV_VAR: &str = "ATRTRADER_LOG";

#[derive(Parser, Debug)]
#[command(name = "atrtrader", about = "ATR stop/take backtester and replay engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Full backtest plus trade, hold-out, walk-forward and robustness analysis
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval: Option<String>,
    },
    /// Feed bars one at a time through the incremental simulator
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval: Option<String>,
    },
    /// Validate configuration and bar data without simulating
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Where the bar series comes from after CLI overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct DataParams {
    pub data_dir: PathBuf,
    pub symbol: String,
    pub interval: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    pub simulator: SimulatorConfig,
    pub in_sample_days: u32,
    pub out_of_sample_days: u32,
    pub sl_multipliers: Vec<f64>,
    pub tp_multipliers: Vec<f64>,
    pub train_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayParams {
    pub simulator: SimulatorConfig,
    pub lookback: usize,
    pub pace: Duration,
}

/// Everything the `backtest` command computes.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub full: BacktestResult,
    pub trades: Vec<TradeRecord>,
    pub trade_stats: TradeStats,
    pub edge: EdgeMetrics,
    pub holdout: BacktestResult,
    pub walk_forward: Vec<WindowResult>,
    pub robustness: Vec<RobustnessResult>,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbol,
            interval,
        } => run_backtest_command(&config, data_dir, symbol, interval),
        Command::Replay {
            config,
            data_dir,
            symbol,
            interval,
        } => run_replay_command(&config, data_dir, symbol, interval),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Installs the global subscriber. `ATRTRADER_LOG` overrides `[log] level`;
/// `[log] format = json` switches to JSON lines. A second call is a no-op.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    // the subscriber may already be set when run() is invoked twice
    let installed = if log_format.trim().eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = installed {
        tracing::debug!(%err, "keeping existing tracing subscriber");
    }
    Ok(())
}

fn init_logging_from(config: &dyn ConfigPort) -> Result<(), AtrtraderError> {
    let level = config
        .get_string("log", "level")
        .unwrap_or_else(|| "info".to_string());
    let format = config
        .get_string("log", "format")
        .unwrap_or_else(|| "text".to_string());
    init_tracing(&level, &format).map_err(|reason| AtrtraderError::invalid("log", "level", reason))
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, AtrtraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn build_simulator_config(config: &dyn ConfigPort) -> Result<SimulatorConfig, AtrtraderError> {
    Ok(SimulatorConfig {
        fee_rate: require_double(config, "strategy", "fee_rate")?,
        atr_stop_multiplier: require_double(config, "strategy", "atr_sl_mult")?,
        atr_take_multiplier: require_double(config, "strategy", "atr_tp_mult")?,
        risk_pct: require_double(config, "strategy", "risk_pct")?,
        initial_equity: require_double(config, "strategy", "initial_equity")?,
    })
}

pub fn build_data_params(
    config: &dyn ConfigPort,
    data_dir: Option<PathBuf>,
    symbol: Option<String>,
    interval: Option<String>,
) -> Result<DataParams, AtrtraderError> {
    let data_dir = data_dir
        .or_else(|| non_empty(config, "data", "data_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let symbol = symbol
        .or_else(|| non_empty(config, "data", "symbol"))
        .ok_or_else(|| AtrtraderError::missing("data", "symbol"))?;
    let interval = interval
        .or_else(|| non_empty(config, "data", "interval"))
        .ok_or_else(|| AtrtraderError::missing("data", "interval"))?;

    Ok(DataParams {
        data_dir,
        symbol: symbol.trim().to_uppercase(),
        interval: interval.trim().to_string(),
    })
}

/// Applies defaults for every optional analysis key. Run the validators
/// first; this only converts.
pub fn build_analysis_params(config: &dyn ConfigPort) -> Result<AnalysisParams, AtrtraderError> {
    let days = |key: &str, default: u32| -> Result<u32, AtrtraderError> {
        match parse_int(config, "walk_forward", key)? {
            None => Ok(default),
            Some(v) => u32::try_from(v).map_err(|_| {
                AtrtraderError::invalid("walk_forward", key, format!("{v} is out of range"))
            }),
        }
    };

    Ok(AnalysisParams {
        simulator: build_simulator_config(config)?,
        in_sample_days: days("in_sample_days", DEFAULT_IN_SAMPLE_DAYS)?,
        out_of_sample_days: days("out_of_sample_days", DEFAULT_OUT_OF_SAMPLE_DAYS)?,
        sl_multipliers: parse_double_list(config, "robustness", "sl_multipliers")?
            .unwrap_or_else(|| DEFAULT_SL_MULTIPLIERS.to_vec()),
        tp_multipliers: parse_double_list(config, "robustness", "tp_multipliers")?
            .unwrap_or_else(|| DEFAULT_TP_MULTIPLIERS.to_vec()),
        train_pct: parse_double(config, "holdout", "train_pct")?.unwrap_or(DEFAULT_TRAIN_PCT),
    })
}

pub fn build_replay_params(config: &dyn ConfigPort) -> Result<ReplayParams, AtrtraderError> {
    let lookback = match parse_int(config, "replay", "lookback")? {
        None => DEFAULT_LOOKBACK,
        Some(v) => usize::try_from(v)
            .map_err(|_| AtrtraderError::invalid("replay", "lookback", "must be at least 1"))?,
    };
    let pace_ms = match parse_int(config, "replay", "pace_ms")? {
        None => 0,
        Some(v) => u64::try_from(v)
            .map_err(|_| AtrtraderError::invalid("replay", "pace_ms", "must be non-negative"))?,
    };

    Ok(ReplayParams {
        simulator: build_simulator_config(config)?,
        lookback,
        pace: Duration::from_millis(pace_ms),
    })
}

/// Fetches and boundary-checks a series. An empty series is `NoData`.
pub fn load_bars(
    source: &dyn BarSource,
    symbol: &str,
    interval: &str,
) -> Result<Vec<Bar>, AtrtraderError> {
    let bars = source.fetch_bars(symbol, interval)?;
    if bars.is_empty() {
        return Err(AtrtraderError::NoData {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        });
    }
    validate_bars(&bars)?;
    Ok(bars)
}

pub fn run_backtest_pipeline(
    bars: &[Bar],
    params: &AnalysisParams,
    gate: &dyn FilterGate,
) -> PipelineReport {
    let full = run_backtest(bars, params.simulator, gate);
    let (trades, trade_stats) = extract_trades(&full.annotated);
    let edge = expectancy(&trades);
    let holdout = run_holdout(bars, params.simulator, params.train_pct, gate);
    let walk_forward = run_walk_forward(
        bars,
        params.simulator,
        params.in_sample_days,
        params.out_of_sample_days,
        gate,
    );
    let robustness = run_robustness(
        bars,
        params.simulator,
        &params.sl_multipliers,
        &params.tp_multipliers,
        gate,
    );

    PipelineReport {
        full,
        trades,
        trade_stats,
        edge,
        holdout,
        walk_forward,
        robustness,
    }
}

fn run_backtest_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    symbol: Option<String>,
    interval: Option<String>,
) -> Result<(), AtrtraderError> {
    let config = load_config(config_path)?;
    init_logging_from(&config)?;

    validate_strategy_config(&config)?;
    validate_analysis_config(&config)?;
    let params = build_analysis_params(&config)?;
    let data = build_data_params(&config, data_dir, symbol, interval)?;

    let source = CsvBarAdapter::new(data.data_dir.clone());
    let bars = load_bars(&source, &data.symbol, &data.interval)?;
    eprintln!(
        "Running backtest: {} {} ({} bars)",
        data.symbol,
        data.interval,
        bars.len()
    );

    let report = run_backtest_pipeline(&bars, &params, &AllowAll);
    print_report(&report, &params);
    Ok(())
}

fn run_replay_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    symbol: Option<String>,
    interval: Option<String>,
) -> Result<(), AtrtraderError> {
    let config = load_config(config_path)?;
    init_logging_from(&config)?;

    validate_strategy_config(&config)?;
    validate_replay_config(&config)?;
    let params = build_replay_params(&config)?;
    let data = build_data_params(&config, data_dir, symbol, interval)?;

    let source = CsvBarAdapter::new(data.data_dir.clone());
    let bars = load_bars(&source, &data.symbol, &data.interval)?;
    eprintln!(
        "Replaying {} {} ({} bars, lookback {})",
        data.symbol,
        data.interval,
        bars.len(),
        params.lookback
    );

    let summary = ReplayRunner::new(params.simulator, &PrecomputedSignals, &AllowAll, params.lookback)
        .with_pace(params.pace)
        .run(bars);
    print_replay_summary(&summary);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), AtrtraderError> {
    let config = load_config(config_path)?;
    init_logging_from(&config)?;

    validate_strategy_config(&config)?;
    validate_analysis_config(&config)?;
    validate_replay_config(&config)?;
    eprintln!("Config validated successfully");

    let data = build_data_params(&config, None, None, None)?;
    let source = CsvBarAdapter::new(data.data_dir.clone());
    let bars = load_bars(&source, &data.symbol, &data.interval)?;

    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        eprintln!(
            "{} {}: {} bars, {} to {}",
            data.symbol,
            data.interval,
            bars.len(),
            first.timestamp,
            last.timestamp
        );
    }
    let warmup = bars.iter().filter(|b| b.atr.is_nan()).count();
    if warmup > 0 {
        eprintln!("  {} bars without ATR (never traded)", warmup);
    }
    let signals = bars.iter().filter(|b| b.signal.is_buy()).count();
    eprintln!("  {} BUY signals", signals);

    eprintln!("\nConfiguration and data are valid.");
    Ok(())
}

fn print_report(report: &PipelineReport, params: &AnalysisParams) {
    let metrics = &report.full.metrics;
    let snapshot = &report.full.snapshot;

    eprintln!("\n=== Backtest Results ===");
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Max Drawdown:     {:.2}%", metrics.max_drawdown * 100.0);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Exits:            {}", metrics.num_exits);
    eprintln!("Final Equity:     {:.2}", metrics.final_equity);
    eprintln!("Total Fees:       {:.2}", snapshot.total_fees);
    if snapshot.has_position {
        eprintln!("Open Position:    yes");
    }

    eprintln!("\n=== Trades ===");
    eprintln!("Trades:           {}", report.trade_stats.num_trades);
    eprintln!("Win Rate:         {:.1}%", report.trade_stats.win_rate * 100.0);
    eprintln!("Avg Return:       {:.2}%", report.trade_stats.avg_return * 100.0);
    eprintln!("Avg Duration:     {}", report.trade_stats.avg_duration);
    eprintln!("Avg Win:          {:.2}%", report.edge.avg_win * 100.0);
    eprintln!("Avg Loss:         {:.2}%", report.edge.avg_loss * 100.0);
    eprintln!("Expectancy:       {:.4}", report.edge.expectancy);
    eprintln!("Profit Factor:    {:.2}", report.edge.profit_factor);

    let holdout = &report.holdout.metrics;
    eprintln!(
        "\n=== Hold-out ({:.0}% out-of-sample) ===",
        (1.0 - params.train_pct) * 100.0
    );
    eprintln!("Total Return:     {:.2}%", holdout.total_return * 100.0);
    eprintln!("Max Drawdown:     {:.2}%", holdout.max_drawdown * 100.0);
    eprintln!("Win Rate:         {:.1}%", holdout.win_rate * 100.0);

    eprintln!(
        "\n=== Walk-forward ({}d in-sample / {}d out-of-sample) ===",
        params.in_sample_days, params.out_of_sample_days
    );
    match summarize(&report.walk_forward) {
        None => eprintln!("  not enough data for a single window"),
        Some(summary) => {
            for w in &report.walk_forward {
                eprintln!(
                    "  #{:<3} IS {:>7.2}%  OOS {:>7.2}%  OOS DD {:>7.2}%  OOS win {:>5.1}%",
                    w.index,
                    w.in_sample_return * 100.0,
                    w.out_of_sample_return * 100.0,
                    w.out_of_sample_drawdown * 100.0,
                    w.out_of_sample_win_rate * 100.0,
                );
            }
            let oos = summary.out_of_sample_return;
            eprintln!(
                "  {} windows, OOS return mean {:.2}% (min {:.2}%, max {:.2}%)",
                summary.windows,
                oos.mean * 100.0,
                oos.min * 100.0,
                oos.max * 100.0
            );
        }
    }

    eprintln!("\n=== Robustness ===");
    for r in &report.robustness {
        eprintln!(
            "  SL {:.2} / TP {:.2}:  return {:>7.2}%  DD {:>7.2}%  win {:>5.1}%",
            r.stop_multiplier,
            r.take_multiplier,
            r.total_return * 100.0,
            r.max_drawdown * 100.0,
            r.win_rate * 100.0,
        );
    }
}

fn print_replay_summary(summary: &ReplaySummary) {
    let s = &summary.snapshot;
    eprintln!("\n=== Replay Summary ===");
    eprintln!("Bars Processed:   {}", summary.bars_processed);
    eprintln!("Trades:           {}", s.num_trades);
    eprintln!("Winning:          {}", s.winning_trades);
    eprintln!("Losing:           {}", s.losing_trades);
    eprintln!("Win Rate:         {:.1}%", s.win_rate() * 100.0);
    eprintln!("Equity:           {:.2}", s.equity);
    eprintln!("Total Return:     {:.2}%", s.total_return() * 100.0);
    eprintln!("Total Fees:       {:.2}", s.total_fees);
    if s.has_position {
        eprintln!("Open Position:    yes");
    }
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
