//! Optional accept/reject gate for candidate entries.

use crate::domain::bar::Bar;

/// What the gate sees when a BUY arrives on a flat book.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub bar: &'a Bar,
    /// Bars visible at decision time, oldest first, ending with `bar`.
    pub history: &'a [Bar],
}

/// Queried only for BUY signals while the simulator is flat, never on exit
/// checks.
pub trait FilterGate: Send + Sync {
    fn allows(&self, ctx: &FilterContext<'_>) -> bool;
}

/// Gate used when no filter is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl FilterGate for AllowAll {
    fn allows(&self, _ctx: &FilterContext<'_>) -> bool {
        true
    }
}
