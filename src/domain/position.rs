//! Open position state and exit triggers.

use chrono::NaiveDateTime;
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "STOP-LOSS"),
            ExitReason::TakeProfit => write!(f, "TAKE-PROFIT"),
        }
    }
}

/// The single long position the simulator may hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Base-asset units.
    pub size: f64,
}

impl Position {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size * (price - self.entry_price)
    }

    pub fn should_stop_loss(&self, low: f64) -> bool {
        low <= self.stop_loss
    }

    pub fn should_take_profit(&self, high: f64) -> bool {
        high >= self.take_profit
    }

    /// Exit level touched by a bar's range, if any. The intrabar path is
    /// unknown, so a bar touching both levels resolves to the stop.
    pub fn exit_trigger(&self, high: f64, low: f64) -> Option<(ExitReason, f64)> {
        if self.should_stop_loss(low) {
            Some((ExitReason::StopLoss, self.stop_loss))
        } else if self.should_take_profit(high) {
            Some((ExitReason::TakeProfit, self.take_profit))
        } else {
            None
        }
    }
}
