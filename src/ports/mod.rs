//! Port traits for the collaborators the core consumes.

pub mod config_port;
pub mod data_port;
pub mod filter_port;
pub mod signal_port;
