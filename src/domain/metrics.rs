//! Aggregate performance metrics over an annotated equity series.

use super::position::ExitReason;
use super::simulator::AnnotatedBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    /// Deepest peak-to-trough decline as a non-positive fraction.
    pub max_drawdown: f64,
    /// Take-profit exits over all exits.
    pub win_rate: f64,
    pub num_exits: usize,
    pub final_equity: f64,
}

impl Metrics {
    pub fn compute(annotated: &[AnnotatedBar], initial_equity: f64) -> Self {
        let equity: Vec<f64> = annotated.iter().map(|b| b.equity).collect();
        let final_equity = equity.last().copied().unwrap_or(initial_equity);

        let (take_profits, stop_losses) =
            annotated
                .iter()
                .fold((0usize, 0usize), |(tp, sl), b| match b.exit_reason {
                    Some(ExitReason::TakeProfit) => (tp + 1, sl),
                    Some(ExitReason::StopLoss) => (tp, sl + 1),
                    None => (tp, sl),
                });
        let num_exits = take_profits + stop_losses;

        Metrics {
            total_return: total_return(final_equity, initial_equity),
            max_drawdown: max_drawdown(&equity),
            win_rate: win_rate(take_profits, num_exits),
            num_exits,
            final_equity,
        }
    }
}

pub fn total_return(final_equity: f64, initial_equity: f64) -> f64 {
    (final_equity - initial_equity) / initial_equity
}

/// `min((equity - running_peak) / running_peak)`. Points whose running peak is
/// not positive are skipped rather than divided by.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut worst = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < worst {
                worst = dd;
            }
        }
    }
    worst
}

fn win_rate(wins: usize, exits: usize) -> f64 {
    if exits > 0 {
        wins as f64 / exits as f64
    } else {
        0.0
    }
}
