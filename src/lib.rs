//! atrtrader — long-only ATR stop/take backtester with walk-forward,
//! robustness and replay modes.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
