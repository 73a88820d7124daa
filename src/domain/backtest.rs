//! Full-series and hold-out backtests.

use tracing::info_span;

use super::bar::Bar;
use super::ledger::LedgerSnapshot;
use super::metrics::Metrics;
use super::simulator::{AnnotatedBar, PositionSimulator, SimulatorConfig};
use crate::ports::filter_port::FilterGate;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub annotated: Vec<AnnotatedBar>,
    pub metrics: Metrics,
    /// Ledger state after the last bar, including any position left open.
    pub snapshot: LedgerSnapshot,
}

/// Batch simulation over `bars` in a fresh simulator.
pub fn run_backtest(bars: &[Bar], config: SimulatorConfig, gate: &dyn FilterGate) -> BacktestResult {
    let _span = info_span!("backtest", bars = bars.len()).entered();

    let mut simulator = PositionSimulator::with_gate(config, gate);
    let annotated = simulator.run_batch(bars);
    let metrics = Metrics::compute(&annotated, config.initial_equity);
    let snapshot = simulator.snapshot();

    tracing::debug!(
        trades = snapshot.num_trades,
        total_return = metrics.total_return,
        "backtest finished"
    );

    BacktestResult {
        annotated,
        metrics,
        snapshot,
    }
}

/// Index where the hold-out segment begins: `floor(len * train_pct)`.
pub fn holdout_split(len: usize, train_pct: f64) -> usize {
    ((len as f64 * train_pct).floor() as usize).min(len)
}

/// Backtest over the trailing `1 - train_pct` share of bars only.
pub fn run_holdout(
    bars: &[Bar],
    config: SimulatorConfig,
    train_pct: f64,
    gate: &dyn FilterGate,
) -> BacktestResult {
    let split = holdout_split(bars.len(), train_pct);
    run_backtest(&bars[split..], config, gate)
}
