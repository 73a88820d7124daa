//! Walk-forward analysis over calendar windows.
//!
//! Windows slide from the first timestamp: in-sample `[start, start + IS]`,
//! out-of-sample `[start + IS, start + IS + OOS]`, then `start += OOS`. Both
//! slices are inclusive, so the bar sitting exactly on the boundary belongs to
//! both. Generation stops once the out-of-sample end passes the last bar.

use chrono::{Duration, NaiveDateTime};
use rayon::prelude::*;
use tracing::info_span;

use super::bar::Bar;
use super::metrics::Metrics;
use super::simulator::{PositionSimulator, SimulatorConfig};
use crate::ports::filter_port::FilterGate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSplit<'a> {
    pub in_sample: &'a [Bar],
    pub out_of_sample: &'a [Bar],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowResult {
    /// 1-based window number.
    pub index: usize,
    pub in_sample_return: f64,
    pub in_sample_drawdown: f64,
    pub out_of_sample_return: f64,
    pub out_of_sample_drawdown: f64,
    pub out_of_sample_win_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Mean/min/max of the headline walk-forward columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkForwardSummary {
    pub windows: usize,
    pub in_sample_return: ColumnStats,
    pub out_of_sample_return: ColumnStats,
    pub out_of_sample_drawdown: ColumnStats,
    pub out_of_sample_win_rate: ColumnStats,
}

/// Bars with `from <= timestamp <= to`.
fn slice_between(bars: &[Bar], from: NaiveDateTime, to: NaiveDateTime) -> &[Bar] {
    let lo = bars.partition_point(|b| b.timestamp < from);
    let hi = bars.partition_point(|b| b.timestamp <= to);
    &bars[lo..hi.max(lo)]
}

/// Calendar splits over a timestamp-ordered series. A zero out-of-sample
/// length would never advance, so it yields no windows.
pub fn generate_splits(
    bars: &[Bar],
    in_sample_days: u32,
    out_of_sample_days: u32,
) -> Vec<WindowSplit<'_>> {
    let mut splits = Vec::new();
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return splits;
    };
    if out_of_sample_days == 0 {
        return splits;
    }

    let is_len = Duration::days(i64::from(in_sample_days));
    let oos_len = Duration::days(i64::from(out_of_sample_days));
    let end = last.timestamp;

    let mut is_start = first.timestamp;
    loop {
        let Some(is_end) = is_start.checked_add_signed(is_len) else {
            break;
        };
        let Some(oos_end) = is_end.checked_add_signed(oos_len) else {
            break;
        };
        if oos_end > end {
            break;
        }
        splits.push(WindowSplit {
            in_sample: slice_between(bars, is_start, is_end),
            out_of_sample: slice_between(bars, is_end, oos_end),
        });
        is_start += oos_len;
    }

    splits
}

/// Runs an independent batch simulation on every in-sample and out-of-sample
/// slice. Windows are evaluated in parallel; results stay in window order.
pub fn run_walk_forward(
    bars: &[Bar],
    config: SimulatorConfig,
    in_sample_days: u32,
    out_of_sample_days: u32,
    gate: &dyn FilterGate,
) -> Vec<WindowResult> {
    let _span = info_span!(
        "walk_forward",
        in_sample_days,
        out_of_sample_days,
        bars = bars.len()
    )
    .entered();

    let splits = generate_splits(bars, in_sample_days, out_of_sample_days);
    tracing::debug!(windows = splits.len(), "generated walk-forward splits");

    splits
        .par_iter()
        .enumerate()
        .map(|(i, split)| {
            let in_sample = simulate(split.in_sample, config, gate);
            let out_of_sample = simulate(split.out_of_sample, config, gate);
            WindowResult {
                index: i + 1,
                in_sample_return: in_sample.total_return,
                in_sample_drawdown: in_sample.max_drawdown,
                out_of_sample_return: out_of_sample.total_return,
                out_of_sample_drawdown: out_of_sample.max_drawdown,
                out_of_sample_win_rate: out_of_sample.win_rate,
            }
        })
        .collect()
}

fn simulate(bars: &[Bar], config: SimulatorConfig, gate: &dyn FilterGate) -> Metrics {
    let mut simulator = PositionSimulator::with_gate(config, gate);
    let annotated = simulator.run_batch(bars);
    Metrics::compute(&annotated, config.initial_equity)
}

impl ColumnStats {
    fn of(values: impl Iterator<Item = f64> + Clone) -> Self {
        let n = values.clone().count() as f64;
        ColumnStats {
            mean: values.clone().sum::<f64>() / n,
            min: values.clone().fold(f64::INFINITY, f64::min),
            max: values.fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// `None` when no window fit the data.
pub fn summarize(results: &[WindowResult]) -> Option<WalkForwardSummary> {
    if results.is_empty() {
        return None;
    }
    Some(WalkForwardSummary {
        windows: results.len(),
        in_sample_return: ColumnStats::of(results.iter().map(|r| r.in_sample_return)),
        out_of_sample_return: ColumnStats::of(results.iter().map(|r| r.out_of_sample_return)),
        out_of_sample_drawdown: ColumnStats::of(results.iter().map(|r| r.out_of_sample_drawdown)),
        out_of_sample_win_rate: ColumnStats::of(results.iter().map(|r| r.out_of_sample_win_rate)),
    })
}
