//! Trade reconstruction from an annotated series, plus per-trade statistics.
//!
//! Trades here are a unit-notional view: entry and exit are both taken at
//! bar closes and PnL is a plain return fraction, independent of the
//! simulator's sizing and fees.

use chrono::{Duration, NaiveDateTime};

use super::position::ExitReason;
use super::simulator::AnnotatedBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRecord {
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    /// `exit_price / entry_price - 1`
    pub pnl: f64,
    pub duration: Duration,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeStats {
    pub num_trades: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub avg_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeMetrics {
    pub win_rate: f64,
    pub avg_win: f64,
    /// Mean of losing returns; zero or negative.
    pub avg_loss: f64,
    pub expectancy: f64,
    /// Infinite when there are no losing trades.
    pub profit_factor: f64,
}

/// Pairs each BUY bar (taken while no reconstructed trade is open) with the
/// next bar that carries an exit reason.
pub fn extract(annotated: &[AnnotatedBar]) -> Vec<TradeRecord> {
    let mut trades = Vec::new();
    let mut open: Option<(NaiveDateTime, f64)> = None;

    for row in annotated {
        match open {
            None if row.bar.signal.is_buy() => {
                open = Some((row.bar.timestamp, row.bar.close));
            }
            Some((entry_time, entry_price)) => {
                if let Some(exit_reason) = row.exit_reason {
                    let exit_price = row.bar.close;
                    trades.push(TradeRecord {
                        entry_time,
                        exit_time: row.bar.timestamp,
                        entry_price,
                        exit_price,
                        pnl: exit_price / entry_price - 1.0,
                        duration: row.bar.timestamp - entry_time,
                        exit_reason,
                    });
                    open = None;
                }
            }
            None => {}
        }
    }

    trades
}

/// Reconstructed trades together with their summary statistics.
pub fn extract_trades(annotated: &[AnnotatedBar]) -> (Vec<TradeRecord>, TradeStats) {
    let trades = extract(annotated);
    let stats = TradeStats::compute(&trades);
    (trades, stats)
}

impl TradeStats {
    pub fn compute(trades: &[TradeRecord]) -> Self {
        if trades.is_empty() {
            return TradeStats {
                num_trades: 0,
                win_rate: 0.0,
                avg_return: 0.0,
                avg_duration: Duration::zero(),
            };
        }

        let n = trades.len();
        let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
        let total_return: f64 = trades.iter().map(|t| t.pnl).sum();
        let total_duration = trades
            .iter()
            .fold(Duration::zero(), |acc, t| acc + t.duration);

        TradeStats {
            num_trades: n,
            win_rate: wins as f64 / n as f64,
            avg_return: total_return / n as f64,
            avg_duration: total_duration / n as i32,
        }
    }
}

pub fn expectancy(trades: &[TradeRecord]) -> EdgeMetrics {
    let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|&p| p < 0.0).collect();

    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins.len() as f64 / trades.len() as f64
    };

    let avg_win = mean(&wins);
    let avg_loss = mean(&losses);
    let expectancy = win_rate * avg_win + (1.0 - win_rate) * avg_loss;

    let total_wins: f64 = wins.iter().sum();
    let total_losses: f64 = losses.iter().sum();
    let profit_factor = if losses.is_empty() {
        f64::INFINITY
    } else {
        total_wins / total_losses.abs()
    };

    EdgeMetrics {
        win_rate,
        avg_win,
        avg_loss,
        expectancy,
        profit_factor,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
