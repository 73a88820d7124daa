//! Bar representation and boundary validation.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::error::AtrtraderError;

/// Entry signal attached to a bar by the signal collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signal {
    Buy,
    #[default]
    Hold,
}

impl Signal {
    pub fn is_buy(self) -> bool {
        self == Signal::Buy
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "HOLD" | "" => Ok(Signal::Hold),
            other => Err(format!("unknown signal '{other}'")),
        }
    }
}

/// One OHLCV candle plus the ATR reading and signal for that period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub atr: f64,
    pub signal: Signal,
}

impl Bar {
    pub fn with_signal(self, signal: Signal) -> Self {
        Bar { signal, ..self }
    }
}

/// Boundary check run before bars reach the simulator: timestamps strictly
/// increasing and every OHLCV field positive.
pub fn validate_bars(bars: &[Bar]) -> Result<(), AtrtraderError> {
    for (row, bar) in bars.iter().enumerate() {
        let fields = [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
            ("volume", bar.volume),
        ];
        for (name, value) in fields {
            // NaN fails this comparison too
            if !(value > 0.0) {
                return Err(AtrtraderError::InvalidBar {
                    row,
                    reason: format!("{name} must be positive (got {value})"),
                });
            }
        }

        if row > 0 {
            let prev = bars[row - 1].timestamp;
            if bar.timestamp == prev {
                return Err(AtrtraderError::InvalidBar {
                    row,
                    reason: format!("duplicate timestamp {}", bar.timestamp),
                });
            }
            if bar.timestamp < prev {
                return Err(AtrtraderError::InvalidBar {
                    row,
                    reason: format!("timestamp {} precedes {}", bar.timestamp, prev),
                });
            }
        }
    }
    Ok(())
}
