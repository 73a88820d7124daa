//! Stop/take multiplier sweep.

use rayon::prelude::*;
use tracing::info_span;

use super::backtest::run_backtest;
use super::bar::Bar;
use super::simulator::SimulatorConfig;
use crate::ports::filter_port::FilterGate;

pub const DEFAULT_SL_MULTIPLIERS: [f64; 3] = [1.2, 1.5, 1.8];
pub const DEFAULT_TP_MULTIPLIERS: [f64; 3] = [2.4, 3.0, 3.6];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustnessResult {
    pub stop_multiplier: f64,
    pub take_multiplier: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
}

/// Grid order: stop multipliers outer, take multipliers inner.
pub fn grid(sl_multipliers: &[f64], tp_multipliers: &[f64]) -> Vec<(f64, f64)> {
    sl_multipliers
        .iter()
        .flat_map(|&sl| tp_multipliers.iter().map(move |&tp| (sl, tp)))
        .collect()
}

/// One fresh full-series backtest per grid cell. Fee, risk and equity come
/// from `base`; only the multipliers vary.
pub fn run_robustness(
    bars: &[Bar],
    base: SimulatorConfig,
    sl_multipliers: &[f64],
    tp_multipliers: &[f64],
    gate: &dyn FilterGate,
) -> Vec<RobustnessResult> {
    let cells = grid(sl_multipliers, tp_multipliers);
    let _span = info_span!("robustness", cells = cells.len(), bars = bars.len()).entered();

    cells
        .par_iter()
        .map(|&(sl, tp)| {
            let result = run_backtest(bars, base.with_multipliers(sl, tp), gate);
            RobustnessResult {
                stop_multiplier: sl,
                take_multiplier: tp,
                total_return: result.metrics.total_return,
                max_drawdown: result.metrics.max_drawdown,
                win_rate: result.metrics.win_rate,
            }
        })
        .collect()
}
