//! Position simulator: the FLAT/LONG state machine behind both batch
//! backtests and incremental replay.
//!
//! Every bar goes through [`PositionSimulator::on_bar_with_history`]; batch
//! mode is a loop over it, so the two modes cannot drift apart.

use chrono::NaiveDateTime;

use super::bar::Bar;
use super::ledger::{EquityLedger, LedgerSnapshot};
use super::position::{ExitReason, Position};
use crate::ports::filter_port::{AllowAll, FilterContext, FilterGate};

/// Fully resolved risk parameters for one run, copied into each simulator.
/// The caller supplies every field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    /// Fee per side, charged as `fee_rate * position_size` (base units).
    pub fee_rate: f64,
    pub atr_stop_multiplier: f64,
    pub atr_take_multiplier: f64,
    /// Fraction of current equity risked per trade.
    pub risk_pct: f64,
    pub initial_equity: f64,
}

impl SimulatorConfig {
    pub fn with_multipliers(self, atr_stop_multiplier: f64, atr_take_multiplier: f64) -> Self {
        SimulatorConfig {
            atr_stop_multiplier,
            atr_take_multiplier,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryEvent {
    pub time: NaiveDateTime,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size: f64,
    pub entry_fee: f64,
    /// Equity after the entry fee.
    pub equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitEvent {
    pub time: NaiveDateTime,
    pub price: f64,
    pub reason: ExitReason,
    pub entry_price: f64,
    pub position_size: f64,
    pub pnl_amount: f64,
    /// Price move from entry to exit, in percent.
    pub pnl_pct: f64,
    pub exit_fee: f64,
    /// Equity after PnL and the exit fee.
    pub equity: f64,
    /// Fractional return on initial equity after this exit.
    pub total_return: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeEvent {
    Entry(EntryEvent),
    Exit(ExitEvent),
}

/// One input bar with the simulator's state after processing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatedBar {
    pub bar: Bar,
    pub in_position: bool,
    /// Fee charged on this bar (entry or exit), zero otherwise.
    pub fee: f64,
    pub exit_reason: Option<ExitReason>,
    pub equity: f64,
    /// Change in equity relative to the previous bar.
    pub strategy_return: f64,
}

pub struct PositionSimulator<'g> {
    config: SimulatorConfig,
    ledger: EquityLedger,
    position: Option<Position>,
    gate: &'g dyn FilterGate,
}

impl PositionSimulator<'static> {
    /// Simulator that accepts every BUY signal.
    pub fn new(config: SimulatorConfig) -> Self {
        PositionSimulator::with_gate(config, &AllowAll)
    }
}

impl<'g> PositionSimulator<'g> {
    pub fn with_gate(config: SimulatorConfig, gate: &'g dyn FilterGate) -> Self {
        PositionSimulator {
            config,
            ledger: EquityLedger::new(config.initial_equity),
            position: None,
            gate,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &EquityLedger {
        &self.ledger
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_long(&self) -> bool {
        self.position.is_some()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot(self.is_long())
    }

    /// Back to FLAT with a fresh ledger at initial equity.
    pub fn reset(&mut self) {
        self.position = None;
        self.ledger.reset();
    }

    /// Incremental mode: process one bar with no history visible to the gate.
    pub fn on_bar(&mut self, bar: &Bar) -> Option<TradeEvent> {
        self.on_bar_with_history(std::slice::from_ref(bar))
    }

    /// Process the last bar of `history`; earlier bars are only context for
    /// the filter gate. Returns at most one event.
    pub fn on_bar_with_history(&mut self, history: &[Bar]) -> Option<TradeEvent> {
        let bar = history.last()?;

        match self.position {
            None => {
                if !bar.signal.is_buy() {
                    return None;
                }
                let ctx = FilterContext { bar, history };
                if !self.gate.allows(&ctx) {
                    tracing::trace!(time = %bar.timestamp, "entry rejected by filter");
                    return None;
                }
                self.open(bar).map(TradeEvent::Entry)
            }
            Some(position) => {
                let (reason, exit_price) = position.exit_trigger(bar.high, bar.low)?;
                Some(TradeEvent::Exit(self.close(
                    position,
                    bar.timestamp,
                    exit_price,
                    reason,
                )))
            }
        }
    }

    /// Batch mode over a full series. The first bar anchors the equity curve
    /// and is not traded; later bars see every earlier bar as gate history.
    pub fn run_batch(&mut self, bars: &[Bar]) -> Vec<AnnotatedBar> {
        self.reset();
        let mut annotated = Vec::with_capacity(bars.len());
        let Some(first) = bars.first() else {
            return annotated;
        };

        annotated.push(AnnotatedBar {
            bar: *first,
            in_position: false,
            fee: 0.0,
            exit_reason: None,
            equity: self.ledger.equity(),
            strategy_return: 0.0,
        });

        let mut prev_equity = self.ledger.equity();
        for i in 1..bars.len() {
            let event = self.on_bar_with_history(&bars[..=i]);
            let (fee, exit_reason) = match event {
                Some(TradeEvent::Entry(e)) => (e.entry_fee, None),
                Some(TradeEvent::Exit(e)) => (e.exit_fee, Some(e.reason)),
                None => (0.0, None),
            };

            let equity = self.ledger.equity();
            let strategy_return = if prev_equity != 0.0 {
                (equity - prev_equity) / prev_equity
            } else {
                0.0
            };
            prev_equity = equity;

            annotated.push(AnnotatedBar {
                bar: bars[i],
                in_position: self.is_long(),
                fee,
                exit_reason,
                equity,
                strategy_return,
            });
        }

        annotated
    }

    fn open(&mut self, bar: &Bar) -> Option<EntryEvent> {
        let entry_price = bar.close;
        let stop_loss = entry_price - self.config.atr_stop_multiplier * bar.atr;
        let take_profit = entry_price + self.config.atr_take_multiplier * bar.atr;

        // also rejects NaN ATR
        let stop_distance = entry_price - stop_loss;
        if !(stop_distance > 0.0) {
            tracing::trace!(time = %bar.timestamp, stop_distance, "invalid stop geometry");
            return None;
        }

        let risk_amount = self.ledger.equity() * self.config.risk_pct;
        let size = risk_amount / stop_distance;
        let entry_fee = self.config.fee_rate * size;
        self.ledger.charge_fee(entry_fee);

        self.position = Some(Position {
            entry_time: bar.timestamp,
            entry_price,
            stop_loss,
            take_profit,
            size,
        });

        tracing::debug!(
            time = %bar.timestamp,
            price = entry_price,
            stop_loss,
            take_profit,
            size,
            "opened long"
        );

        Some(EntryEvent {
            time: bar.timestamp,
            price: entry_price,
            stop_loss,
            take_profit,
            position_size: size,
            entry_fee,
            equity: self.ledger.equity(),
        })
    }

    fn close(
        &mut self,
        position: Position,
        time: NaiveDateTime,
        exit_price: f64,
        reason: ExitReason,
    ) -> ExitEvent {
        let pnl_amount = position.unrealized_pnl(exit_price);
        let exit_fee = self.config.fee_rate * position.size;
        self.ledger.settle(pnl_amount, exit_fee);
        self.position = None;

        let equity = self.ledger.equity();
        tracing::debug!(
            time = %time,
            price = exit_price,
            reason = %reason,
            pnl = pnl_amount,
            equity,
            "closed long"
        );

        ExitEvent {
            time,
            price: exit_price,
            reason,
            entry_price: position.entry_price,
            position_size: position.size,
            pnl_amount,
            pnl_pct: (exit_price - position.entry_price) / position.entry_price * 100.0,
            exit_fee,
            equity,
            total_return: (equity - self.ledger.initial_equity()) / self.ledger.initial_equity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Signal;
    use chrono::{Duration, NaiveDate};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(i)
    }

    fn bar(i: i64, close: f64, high: f64, low: f64, atr: f64, signal: Signal) -> Bar {
        Bar {
            timestamp: ts(i),
            open: close,
            high,
            low,
            close,
            volume: 1_000.0,
            atr,
            signal,
        }
    }

    fn flat(i: i64, close: f64) -> Bar {
        bar(i, close, close + 0.5, close - 0.5, 10.0, Signal::Hold)
    }

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            fee_rate: 0.0,
            atr_stop_multiplier: 1.0,
            atr_take_multiplier: 2.0,
            risk_pct: 0.01,
            initial_equity: 10_000.0,
        }
    }

    struct RejectAll;

    impl FilterGate for RejectAll {
        fn allows(&self, _ctx: &FilterContext<'_>) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct CountingGate {
        calls: AtomicUsize,
    }

    impl FilterGate for CountingGate {
        fn allows(&self, _ctx: &FilterContext<'_>) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn buy_opens_with_atr_levels_and_risk_size() {
        let mut sim = PositionSimulator::new(config());
        let event = sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));

        match event {
            Some(TradeEvent::Entry(e)) => {
                assert!((e.stop_loss - 90.0).abs() < f64::EPSILON);
                assert!((e.take_profit - 120.0).abs() < f64::EPSILON);
                assert!((e.position_size - 10.0).abs() < 1e-12);
                assert!((e.entry_fee - 0.0).abs() < f64::EPSILON);
            }
            other => panic!("expected entry, got {other:?}"),
        }
        assert!(sim.is_long());
    }

    #[test]
    fn hold_while_flat_does_nothing() {
        let mut sim = PositionSimulator::new(config());
        assert!(sim.on_bar(&flat(1, 100.0)).is_none());
        assert!(!sim.is_long());
    }

    #[test]
    fn entry_fee_is_rate_times_size() {
        let cfg = SimulatorConfig {
            fee_rate: 0.5,
            ..config()
        };
        let mut sim = PositionSimulator::new(cfg);
        sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        // size 10 units, fee 0.5 per unit regardless of price
        assert!((sim.ledger().equity() - 9_995.0).abs() < 1e-9);
        assert!((sim.ledger().total_fees() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_atr_skips_entry() {
        let mut sim = PositionSimulator::new(config());
        assert!(sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 0.0, Signal::Buy)).is_none());
        assert!(!sim.is_long());
    }

    #[test]
    fn negative_stop_multiplier_skips_entry() {
        let cfg = config().with_multipliers(-1.0, 2.0);
        let mut sim = PositionSimulator::new(cfg);
        assert!(sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy)).is_none());
    }

    #[test]
    fn nan_atr_skips_entry() {
        let mut sim = PositionSimulator::new(config());
        assert!(sim.on_bar(&bar(1, 100.0, 101.0, 99.0, f64::NAN, Signal::Buy)).is_none());
        assert!(!sim.is_long());
    }

    #[test]
    fn take_profit_exit_books_pnl() {
        let mut sim = PositionSimulator::new(config());
        sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        let event = sim.on_bar(&bar(2, 110.0, 121.0, 95.0, 10.0, Signal::Hold));

        match event {
            Some(TradeEvent::Exit(e)) => {
                assert_eq!(e.reason, ExitReason::TakeProfit);
                assert!((e.price - 120.0).abs() < f64::EPSILON);
                assert!((e.pnl_amount - 200.0).abs() < 1e-9);
                assert!((e.pnl_pct - 20.0).abs() < 1e-9);
                assert!((e.equity - 10_200.0).abs() < 1e-9);
                assert!((e.total_return - 0.02).abs() < 1e-12);
            }
            other => panic!("expected exit, got {other:?}"),
        }
        assert!(!sim.is_long());
        assert_eq!(sim.ledger().winning_trades(), 1);
    }

    #[test]
    fn stop_loss_wins_when_both_levels_touched() {
        let mut sim = PositionSimulator::new(config());
        sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        let event = sim.on_bar(&bar(2, 100.0, 130.0, 80.0, 10.0, Signal::Hold));

        match event {
            Some(TradeEvent::Exit(e)) => {
                assert_eq!(e.reason, ExitReason::StopLoss);
                assert!((e.price - 90.0).abs() < f64::EPSILON);
                assert!((e.pnl_amount - (-100.0)).abs() < 1e-9);
            }
            other => panic!("expected exit, got {other:?}"),
        }
        assert_eq!(sim.ledger().losing_trades(), 1);
    }

    #[test]
    fn buy_while_long_does_not_pyramid() {
        let mut sim = PositionSimulator::new(config());
        sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        let before = *sim.position().unwrap();

        let event = sim.on_bar(&bar(2, 105.0, 106.0, 104.0, 20.0, Signal::Buy));
        assert!(event.is_none());
        assert_eq!(*sim.position().unwrap(), before);
    }

    #[test]
    fn buy_while_long_still_checks_exit() {
        let mut sim = PositionSimulator::new(config());
        sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        let event = sim.on_bar(&bar(2, 89.0, 95.0, 85.0, 10.0, Signal::Buy));
        assert!(matches!(
            event,
            Some(TradeEvent::Exit(ExitEvent {
                reason: ExitReason::StopLoss,
                ..
            }))
        ));
        assert!(!sim.is_long());
    }

    #[test]
    fn entry_bar_is_not_exit_checked() {
        let mut sim = PositionSimulator::new(config());
        // range already spans the stop level on the entry bar
        let event = sim.on_bar(&bar(1, 100.0, 101.0, 80.0, 10.0, Signal::Buy));
        assert!(matches!(event, Some(TradeEvent::Entry(_))));
        assert!(sim.is_long());
    }

    #[test]
    fn rejected_by_gate_stays_flat() {
        let gate = RejectAll;
        let mut sim = PositionSimulator::with_gate(config(), &gate);
        assert!(sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy)).is_none());
        assert!(!sim.is_long());
    }

    #[test]
    fn gate_only_queried_for_buy_while_flat() {
        let gate = CountingGate::default();
        let mut sim = PositionSimulator::with_gate(config(), &gate);

        sim.on_bar(&flat(0, 100.0));
        sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        sim.on_bar(&bar(2, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        sim.on_bar(&bar(3, 100.0, 101.0, 99.0, 10.0, Signal::Hold));

        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_batch_empty_input() {
        let mut sim = PositionSimulator::new(config());
        assert!(sim.run_batch(&[]).is_empty());
    }

    #[test]
    fn run_batch_first_bar_is_anchor_only() {
        let mut sim = PositionSimulator::new(config());
        let bars = vec![bar(0, 100.0, 101.0, 99.0, 10.0, Signal::Buy), flat(1, 100.0)];
        let out = sim.run_batch(&bars);

        assert_eq!(out.len(), 2);
        assert!(!out[0].in_position);
        assert!(!out[1].in_position);
        assert!((out[0].equity - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn run_batch_annotates_fees_and_exit() {
        let cfg = SimulatorConfig {
            fee_rate: 0.1,
            ..config()
        };
        let mut sim = PositionSimulator::new(cfg);
        let bars = vec![
            flat(0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy),
            bar(2, 110.0, 121.0, 95.0, 10.0, Signal::Hold),
        ];
        let out = sim.run_batch(&bars);

        assert!(out[1].in_position);
        assert!((out[1].fee - 1.0).abs() < 1e-12);
        assert!(!out[2].in_position);
        assert_eq!(out[2].exit_reason, Some(ExitReason::TakeProfit));
        assert!((out[2].fee - 1.0).abs() < 1e-12);
        assert!((out[2].equity - (10_000.0 - 1.0 + 200.0 - 1.0)).abs() < 1e-9);
        assert!((out[1].strategy_return - (-1.0 / 10_000.0)).abs() < 1e-15);
    }

    #[test]
    fn run_batch_resets_previous_state() {
        let mut sim = PositionSimulator::new(config());
        let bars = vec![
            flat(0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy),
            bar(2, 110.0, 121.0, 95.0, 10.0, Signal::Hold),
        ];
        let first = sim.run_batch(&bars);
        let second = sim.run_batch(&bars);
        assert_eq!(first, second);
        assert_eq!(sim.ledger().num_trades(), 1);
    }

    #[test]
    fn reset_clears_position_and_ledger() {
        let mut sim = PositionSimulator::new(config());
        sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        sim.reset();
        assert!(!sim.is_long());
        assert_eq!(sim.snapshot(), EquityLedger::new(10_000.0).snapshot(false));
    }

    #[test]
    fn risk_scales_with_current_equity() {
        let mut sim = PositionSimulator::new(config());
        sim.on_bar(&bar(1, 100.0, 101.0, 99.0, 10.0, Signal::Buy));
        sim.on_bar(&bar(2, 110.0, 121.0, 95.0, 10.0, Signal::Hold));
        let event = sim.on_bar(&bar(3, 100.0, 101.0, 99.0, 10.0, Signal::Buy));

        match event {
            Some(TradeEvent::Entry(e)) => {
                // 10_200 * 0.01 / 10
                assert!((e.position_size - 10.2).abs() < 1e-9);
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }
}
