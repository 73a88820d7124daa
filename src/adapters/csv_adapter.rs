//! CSV bar file adapter.
//!
//! One file per series, `{symbol}_{interval}.csv`, with a header row naming
//! at least `open_time,open,high,low,close,volume,atr_14`. A `signal` column
//! is optional; absent or blank cells read as HOLD. A blank `atr_14` cell
//! reads as NaN (indicator warm-up).

use crate::domain::bar::{Bar, Signal};
use crate::domain::error::AtrtraderError;
use crate::ports::data_port::BarSource;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvBarAdapter {
    base_path: PathBuf,
}

/// Header positions resolved once per file.
struct Columns {
    open_time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    atr: usize,
    signal: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, AtrtraderError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| AtrtraderError::DataSource {
                reason: format!("missing {name} column"),
            })
        };
        Ok(Columns {
            open_time: require("open_time")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: require("volume")?,
            atr: require("atr_14")?,
            signal: find("signal"),
        })
    }
}

impl CsvBarAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_field(record: &csv::StringRecord, idx: usize, name: &str, row: usize) -> Result<f64, AtrtraderError> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse().map_err(|_| AtrtraderError::InvalidBar {
        row,
        reason: format!("invalid {} value '{}'", name, raw),
    })
}

impl BarSource for CsvBarAdapter {
    fn fetch_bars(&self, symbol: &str, interval: &str) -> Result<Vec<Bar>, AtrtraderError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AtrtraderError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            },
            _ => AtrtraderError::DataSource {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| AtrtraderError::DataSource {
            reason: format!("CSV header error: {}", e),
        })?;
        let cols = Columns::resolve(headers)?;

        let mut bars = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            // 1-based file line; the header is line 1
            let row = i + 2;
            let record = result.map_err(|e| AtrtraderError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let time_str = record.get(cols.open_time).unwrap_or("");
            let timestamp = parse_timestamp(time_str).ok_or_else(|| AtrtraderError::InvalidBar {
                row,
                reason: format!("invalid open_time '{}'", time_str.trim()),
            })?;

            let atr = match record.get(cols.atr).map(str::trim) {
                None | Some("") => f64::NAN,
                Some(_) => parse_field(&record, cols.atr, "atr_14", row)?,
            };

            let signal = match cols.signal.and_then(|i| record.get(i)) {
                None => Signal::Hold,
                Some(s) => s
                    .parse::<Signal>()
                    .map_err(|reason| AtrtraderError::InvalidBar { row, reason })?,
            };

            bars.push(Bar {
                timestamp,
                open: parse_field(&record, cols.open, "open", row)?,
                high: parse_field(&record, cols.high, "high", row)?,
                low: parse_field(&record, cols.low, "low", row)?,
                close: parse_field(&record, cols.close, "close", row)?,
                volume: parse_field(&record, cols.volume, "volume", row)?,
                atr,
                signal,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        tracing::debug!(symbol, interval, bars = bars.len(), path = %path.display(), "loaded bars");
        Ok(bars)
    }
}
