#![allow(dead_code)]

use atrtrader::domain::bar::{Bar, Signal};
use atrtrader::domain::error::AtrtraderError;
use atrtrader::domain::simulator::SimulatorConfig;
use atrtrader::ports::data_port::BarSource;
use atrtrader::ports::filter_port::{FilterContext, FilterGate};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct MockBarSource {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl BarSource for MockBarSource {
    fn fetch_bars(&self, symbol: &str, _interval: &str) -> Result<Vec<Bar>, AtrtraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(AtrtraderError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }
}

/// Rejects every candidate entry.
pub struct RejectAll;

impl FilterGate for RejectAll {
    fn allows(&self, _ctx: &FilterContext<'_>) -> bool {
        false
    }
}

/// Allows every entry and counts how often it was asked.
#[derive(Default)]
pub struct CountingGate {
    pub calls: AtomicUsize,
}

impl CountingGate {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FilterGate for CountingGate {
    fn allows(&self, _ctx: &FilterContext<'_>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn hour(i: i64) -> NaiveDateTime {
    t0() + Duration::hours(i)
}

pub fn day(i: i64) -> NaiveDateTime {
    t0() + Duration::days(i)
}

pub fn make_bar(timestamp: NaiveDateTime, close: f64, high: f64, low: f64, atr: f64, signal: Signal) -> Bar {
    Bar {
        timestamp,
        open: close,
        high,
        low,
        close,
        volume: 1_000.0,
        atr,
        signal,
    }
}

/// Quiet bar: half-point range around `close`, ATR 10, HOLD.
pub fn quiet_bar(timestamp: NaiveDateTime, close: f64) -> Bar {
    make_bar(timestamp, close, close + 0.5, close - 0.5, 10.0, Signal::Hold)
}

pub fn buy_bar(timestamp: NaiveDateTime, close: f64, atr: f64) -> Bar {
    make_bar(timestamp, close, close + 0.5, close - 0.5, atr, Signal::Buy)
}

pub fn scenario_config() -> SimulatorConfig {
    SimulatorConfig {
        fee_rate: 0.0,
        atr_stop_multiplier: 1.0,
        atr_take_multiplier: 2.0,
        risk_pct: 0.01,
        initial_equity: 10_000.0,
    }
}

/// Deterministic series with a repeating pattern: BUY, drift, then either a
/// spike through the take level or a drop through the stop level.
pub fn cycling_series(n: usize, step: Duration) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(n);
    let mut ts = t0();
    for i in 0..n {
        let phase = i % 6;
        let base = 100.0 + (i / 6) as f64;
        let bar = match phase {
            1 => make_bar(ts, base, base + 0.5, base - 0.5, 2.0, Signal::Buy),
            2 => make_bar(ts, base + 0.3, base + 1.0, base - 0.4, 2.0, Signal::Hold),
            3 if (i / 6) % 3 == 0 => make_bar(ts, base - 2.0, base, base - 3.0, 2.0, Signal::Hold),
            3 => make_bar(ts, base + 4.0, base + 5.0, base + 1.0, 2.0, Signal::Buy),
            _ => make_bar(ts, base, base + 0.5, base - 0.5, 2.0, Signal::Hold),
        };
        bars.push(bar);
        ts += step;
    }
    bars
}
