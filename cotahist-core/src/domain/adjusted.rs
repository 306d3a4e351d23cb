//! Secondary-source adjusted closes and the reconciled output row.

use super::trade::TradeRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One point of a secondary-source adjusted close series.
///
/// `symbol` is in the secondary source's form (e.g. `PETR4.SA`), not the
/// exchange trading code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedPricePoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub adj_close: f64,
}

/// Primary record joined with the secondary adjusted close for the same date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub record: TradeRecord,
    /// `None` when the secondary source has no value for this instrument and date.
    pub adj_close: Option<f64>,
}

impl ReconciledRow {
    pub fn instrument(&self) -> &str {
        &self.record.instrument
    }

    pub fn date(&self) -> NaiveDate {
        self.record.date
    }
}
