//! Signal evaluation port.

use crate::domain::bar::{Bar, Signal};

/// Decides BUY or HOLD for a bar. Indicator values arrive already computed.
pub trait SignalSource: Send + Sync {
    fn evaluate(&self, bar: &Bar) -> Signal;
}

/// Uses the signal already stored on the bar.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedSignals;

impl SignalSource for PrecomputedSignals {
    fn evaluate(&self, bar: &Bar) -> Signal {
        bar.signal
    }
}
