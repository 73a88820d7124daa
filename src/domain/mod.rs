//! Core domain types and logic.

pub mod bar;
pub mod position;
pub mod ledger;
pub mod simulator;
pub mod metrics;
pub mod trades;
pub mod backtest;
pub mod walk_forward;
pub mod robustness;
pub mod replay;
pub mod config_validation;
pub mod error;
