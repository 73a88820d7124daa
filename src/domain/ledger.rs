//! Equity and fee accounting owned by the position simulator.

/// Running account state for one simulation run.
///
/// Only the simulator mutates a ledger; callers read it through accessors or
/// a [`LedgerSnapshot`]. Equity is not clamped and may go negative.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityLedger {
    initial_equity: f64,
    equity: f64,
    total_fees: f64,
    num_trades: usize,
    winning_trades: usize,
    losing_trades: usize,
}

/// Read-only view of a ledger plus the simulator's open/flat flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSnapshot {
    pub initial_equity: f64,
    pub equity: f64,
    pub total_fees: f64,
    pub num_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub has_position: bool,
}

impl LedgerSnapshot {
    /// Winning share of closed trades; 0 before the first close.
    pub fn win_rate(&self) -> f64 {
        if self.num_trades > 0 {
            self.winning_trades as f64 / self.num_trades as f64
        } else {
            0.0
        }
    }

    pub fn total_return(&self) -> f64 {
        (self.equity - self.initial_equity) / self.initial_equity
    }
}

impl EquityLedger {
    pub fn new(initial_equity: f64) -> Self {
        EquityLedger {
            initial_equity,
            equity: initial_equity,
            total_fees: 0.0,
            num_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
        }
    }

    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn total_fees(&self) -> f64 {
        self.total_fees
    }

    pub fn num_trades(&self) -> usize {
        self.num_trades
    }

    pub fn winning_trades(&self) -> usize {
        self.winning_trades
    }

    pub fn losing_trades(&self) -> usize {
        self.losing_trades
    }

    pub fn snapshot(&self, has_position: bool) -> LedgerSnapshot {
        LedgerSnapshot {
            initial_equity: self.initial_equity,
            equity: self.equity,
            total_fees: self.total_fees,
            num_trades: self.num_trades,
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
            has_position,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = EquityLedger::new(self.initial_equity);
    }

    pub(crate) fn charge_fee(&mut self, fee: f64) {
        self.equity -= fee;
        self.total_fees += fee;
    }

    /// Books a closed trade: realized PnL first, then the exit fee.
    pub(crate) fn settle(&mut self, pnl: f64, exit_fee: f64) {
        self.equity += pnl;
        self.charge_fee(exit_fee);
        self.num_trades += 1;
        if pnl > 0.0 {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ledger() {
        let ledger = EquityLedger::new(10_000.0);
        assert!((ledger.equity() - 10_000.0).abs() < f64::EPSILON);
        assert!((ledger.initial_equity() - 10_000.0).abs() < f64::EPSILON);
        assert!((ledger.total_fees() - 0.0).abs() < f64::EPSILON);
        assert_eq!(ledger.num_trades(), 0);
    }

    #[test]
    fn charge_fee_reduces_equity_and_accumulates() {
        let mut ledger = EquityLedger::new(1_000.0);
        ledger.charge_fee(2.5);
        ledger.charge_fee(1.5);
        assert!((ledger.equity() - 996.0).abs() < f64::EPSILON);
        assert!((ledger.total_fees() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn settle_counts_wins_and_losses() {
        let mut ledger = EquityLedger::new(1_000.0);
        ledger.settle(50.0, 1.0);
        ledger.settle(-20.0, 1.0);
        ledger.settle(0.0, 1.0);
        assert_eq!(ledger.num_trades(), 3);
        assert_eq!(ledger.winning_trades(), 1);
        // breakeven counts as a loss
        assert_eq!(ledger.losing_trades(), 2);
        assert!((ledger.equity() - 1_027.0).abs() < 1e-9);
        assert!((ledger.total_fees() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn equity_can_go_negative() {
        let mut ledger = EquityLedger::new(100.0);
        ledger.settle(-150.0, 0.0);
        assert!(ledger.equity() < 0.0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut ledger = EquityLedger::new(500.0);
        ledger.charge_fee(3.0);
        ledger.settle(10.0, 3.0);
        ledger.reset();
        assert_eq!(ledger, EquityLedger::new(500.0));
    }

    #[test]
    fn snapshot_derived_values() {
        let mut ledger = EquityLedger::new(1_000.0);
        ledger.settle(100.0, 0.0);
        ledger.settle(-50.0, 0.0);
        let snap = ledger.snapshot(true);
        assert!(snap.has_position);
        assert!((snap.win_rate() - 0.5).abs() < f64::EPSILON);
        assert!((snap.total_return() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn snapshot_win_rate_zero_without_trades() {
        let snap = EquityLedger::new(1_000.0).snapshot(false);
        assert!((snap.win_rate() - 0.0).abs() < f64::EPSILON);
    }
}
