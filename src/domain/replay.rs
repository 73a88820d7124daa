//! Sequential replay: bars arrive one at a time, as they would from a live
//! feed, and drive a single simulator incrementally.

use std::collections::VecDeque;
use std::time::Duration;

use super::bar::Bar;
use super::ledger::LedgerSnapshot;
use super::simulator::{PositionSimulator, SimulatorConfig, TradeEvent};
use crate::ports::filter_port::FilterGate;
use crate::ports::signal_port::SignalSource;

pub const DEFAULT_LOOKBACK: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySummary {
    pub snapshot: LedgerSnapshot,
    pub bars_processed: usize,
}

pub struct ReplayRunner<'a> {
    simulator: PositionSimulator<'a>,
    signals: &'a dyn SignalSource,
    window: VecDeque<Bar>,
    lookback: usize,
    pace: Option<Duration>,
    bars_processed: usize,
}

impl<'a> ReplayRunner<'a> {
    /// `lookback` is clamped to at least one bar.
    pub fn new(
        config: SimulatorConfig,
        signals: &'a dyn SignalSource,
        gate: &'a dyn FilterGate,
        lookback: usize,
    ) -> Self {
        let lookback = lookback.max(1);
        ReplayRunner {
            simulator: PositionSimulator::with_gate(config, gate),
            signals,
            window: VecDeque::with_capacity(lookback),
            lookback,
            pace: None,
            bars_processed: 0,
        }
    }

    /// Sleep between bars; zero disables pacing.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = (!pace.is_zero()).then_some(pace);
        self
    }

    pub fn simulator(&self) -> &PositionSimulator<'a> {
        &self.simulator
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Signals the newest bar, pushes it into the rolling window and runs one
    /// simulator step with the window as history.
    pub fn on_new_bar(&mut self, bar: Bar) -> Option<TradeEvent> {
        let bar = bar.with_signal(self.signals.evaluate(&bar));

        if self.window.len() == self.lookback {
            self.window.pop_front();
        }
        self.window.push_back(bar);
        self.bars_processed += 1;

        let history = self.window.make_contiguous();
        let event = self.simulator.on_bar_with_history(history);
        match &event {
            Some(TradeEvent::Entry(e)) => tracing::info!(
                time = %e.time,
                price = e.price,
                stop_loss = e.stop_loss,
                take_profit = e.take_profit,
                size = e.position_size,
                fee = e.entry_fee,
                "ENTRY"
            ),
            Some(TradeEvent::Exit(e)) => tracing::info!(
                time = %e.time,
                price = e.price,
                reason = %e.reason,
                pnl = e.pnl_amount,
                pnl_pct = e.pnl_pct,
                equity = e.equity,
                total_return = e.total_return,
                "EXIT"
            ),
            None => tracing::trace!(time = %bar.timestamp, signal = %bar.signal, "no action"),
        }
        event
    }

    /// Drains `bars`, pacing between them if configured.
    pub fn run<I>(mut self, bars: I) -> ReplaySummary
    where
        I: IntoIterator<Item = Bar>,
    {
        for bar in bars {
            self.on_new_bar(bar);
            if let Some(pace) = self.pace {
                std::thread::sleep(pace);
            }
        }
        let summary = self.summary();
        tracing::info!(
            bars = summary.bars_processed,
            trades = summary.snapshot.num_trades,
            equity = summary.snapshot.equity,
            "replay finished"
        );
        summary
    }

    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            snapshot: self.simulator.snapshot(),
            bars_processed: self.bars_processed,
        }
    }
}
