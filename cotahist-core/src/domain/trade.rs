//! One decoded quote line of a daily bulk file.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily trade summary for one instrument, decoded from a COTAHIST quote line.
///
/// Price fields are already divided by 100 (the file stores them as scaled
/// integers), so every `f64` price here is in currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub instrument: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Number of units traded.
    pub volume: u64,
    /// Financial volume traded, in currency units.
    pub turnover: f64,

    pub bdi_code: String,
    pub market_type: u16,
    pub issuer: String,
    pub specification: String,
    pub term_days: Option<u16>,
    pub currency: String,
    pub average: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub trades: u32,
    pub strike: f64,
    pub correction_indicator: u8,
    pub expiration: Option<NaiveDate>,
    pub quotation_factor: u32,
    pub strike_points: f64,
    pub isin: String,
    pub distribution: u16,
}
