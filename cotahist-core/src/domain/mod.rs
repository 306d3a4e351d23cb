//! Domain types for cotahist

pub mod adjusted;
pub mod trade;

pub use adjusted::{AdjustedPricePoint, ReconciledRow};
pub use trade::TradeRecord;
