//! Configuration validation.
//!
//! Checks every config field before a run starts. Optional keys are only
//! checked when present; their defaults are applied by the caller.

use crate::domain::error::AtrtraderError;
use crate::ports::config_port::ConfigPort;

/// `[strategy]` keys that have no default.
pub const STRATEGY_KEYS: [&str; 5] = [
    "initial_equity",
    "risk_pct",
    "fee_rate",
    "atr_sl_mult",
    "atr_tp_mult",
];

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), AtrtraderError> {
    let initial_equity = require_double(config, "strategy", "initial_equity")?;
    if !(initial_equity > 0.0) {
        return Err(AtrtraderError::invalid(
            "strategy",
            "initial_equity",
            "initial_equity must be positive",
        ));
    }

    let risk_pct = require_double(config, "strategy", "risk_pct")?;
    if !(risk_pct > 0.0 && risk_pct <= 1.0) {
        return Err(AtrtraderError::invalid(
            "strategy",
            "risk_pct",
            "risk_pct must be in (0, 1]",
        ));
    }

    let fee_rate = require_double(config, "strategy", "fee_rate")?;
    if !(fee_rate >= 0.0) {
        return Err(AtrtraderError::invalid(
            "strategy",
            "fee_rate",
            "fee_rate must be non-negative",
        ));
    }

    for key in ["atr_sl_mult", "atr_tp_mult"] {
        let value = require_double(config, "strategy", key)?;
        if !(value > 0.0) {
            return Err(AtrtraderError::invalid(
                "strategy",
                key,
                format!("{key} must be positive"),
            ));
        }
    }

    Ok(())
}

/// `[walk_forward]`, `[robustness]` and `[holdout]`.
pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), AtrtraderError> {
    for key in ["in_sample_days", "out_of_sample_days"] {
        if let Some(days) = parse_int(config, "walk_forward", key)? {
            if days <= 0 || days > i64::from(u32::MAX) {
                return Err(AtrtraderError::invalid(
                    "walk_forward",
                    key,
                    format!("{key} must be a positive number of days"),
                ));
            }
        }
    }

    for key in ["sl_multipliers", "tp_multipliers"] {
        if let Some(values) = parse_double_list(config, "robustness", key)? {
            if let Some(bad) = values.iter().find(|v| !(**v > 0.0)) {
                return Err(AtrtraderError::invalid(
                    "robustness",
                    key,
                    format!("multipliers must be positive (got {bad})"),
                ));
            }
        }
    }

    if let Some(train_pct) = parse_double(config, "holdout", "train_pct")? {
        if !(train_pct > 0.0 && train_pct < 1.0) {
            return Err(AtrtraderError::invalid(
                "holdout",
                "train_pct",
                "train_pct must be in (0, 1)",
            ));
        }
    }

    Ok(())
}

pub fn validate_replay_config(config: &dyn ConfigPort) -> Result<(), AtrtraderError> {
    if let Some(lookback) = parse_int(config, "replay", "lookback")? {
        if lookback < 1 {
            return Err(AtrtraderError::invalid(
                "replay",
                "lookback",
                "lookback must be at least 1",
            ));
        }
    }
    if let Some(pace) = parse_int(config, "replay", "pace_ms")? {
        if pace < 0 {
            return Err(AtrtraderError::invalid(
                "replay",
                "pace_ms",
                "pace_ms must be non-negative",
            ));
        }
    }
    Ok(())
}

/// Present and parseable, or an error naming the key.
pub(crate) fn require_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<f64, AtrtraderError> {
    parse_double(config, section, key)?.ok_or_else(|| AtrtraderError::missing(section, key))
}

/// `None` when the key is absent or blank.
pub(crate) fn parse_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, AtrtraderError> {
    match present(config, section, key) {
        None => Ok(None),
        Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
            AtrtraderError::invalid(section, key, format!("'{raw}' is not a number"))
        }),
    }
}

pub(crate) fn parse_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, AtrtraderError> {
    match present(config, section, key) {
        None => Ok(None),
        Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
            AtrtraderError::invalid(section, key, format!("'{raw}' is not an integer"))
        }),
    }
}

pub(crate) fn parse_double_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<f64>>, AtrtraderError> {
    match config.get_double_list(section, key) {
        None => Ok(None),
        Some(Ok(values)) => Ok(Some(values)),
        Some(Err(token)) => Err(AtrtraderError::invalid(
            section,
            key,
            format!("'{token}' is not a number"),
        )),
    }
}

fn present(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
