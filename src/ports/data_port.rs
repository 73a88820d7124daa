//! Bar data access port trait.

use crate::domain::bar::Bar;
use crate::domain::error::AtrtraderError;

/// Supplies the ordered bar series for one symbol and interval. Implementors
/// return bars sorted by timestamp; validation happens at the call site.
pub trait BarSource {
    fn fetch_bars(&self, symbol: &str, interval: &str) -> Result<Vec<Bar>, AtrtraderError>;
}
