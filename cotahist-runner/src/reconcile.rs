//! Join primary trade records with secondary adjusted-close series.
//!
//! Records are matched to the secondary series by instrument (through
//! [`SymbolMap`]) and exact calendar date. A missing or failed series never
//! drops primary rows: they come out with `adj_close = None`.

use chrono::NaiveDate;
use cotahist_core::data::SourceError;
use cotahist_core::domain::{AdjustedPricePoint, ReconciledRow, TradeRecord};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Secondary symbol → fetched series (or the error fetching it).
pub type SecondarySeries = HashMap<String, Result<Vec<AdjustedPricePoint>, SourceError>>;

/// Maps exchange trading codes to secondary-source symbols.
///
/// Exchange codes carry a share-class digit (`PETR4`, `VALE3`, `BOVA11`) and
/// get the market suffix; anything else is passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMap {
    suffix: String,
}

impl SymbolMap {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn secondary_symbol(&self, instrument: &str) -> String {
        let is_exchange_code = instrument.chars().any(|c| c.is_ascii_digit());
        if is_exchange_code && !instrument.ends_with(self.suffix.as_str()) {
            format!("{instrument}{}", self.suffix)
        } else {
            instrument.to_string()
        }
    }
}

impl Default for SymbolMap {
    fn default() -> Self {
        Self::new(".SA")
    }
}

/// Why an instrument's rows carry no adjusted closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// No series was fetched for the symbol.
    Missing,
    /// Fetching the series failed.
    Failed(SourceError),
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedReason::Missing => write!(f, "no secondary series"),
            UnmatchedReason::Failed(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmatched {
    pub instrument: String,
    pub symbol: String,
    pub reason: UnmatchedReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Ordered by instrument, then date.
    pub rows: Vec<ReconciledRow>,
    pub unmatched: Vec<Unmatched>,
    /// Secondary dates that appeared more than once; the first value was used.
    pub duplicate_dates: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    symbols: SymbolMap,
}

impl Reconciler {
    pub fn new(symbols: SymbolMap) -> Self {
        Self { symbols }
    }

    pub fn symbols(&self) -> &SymbolMap {
        &self.symbols
    }

    pub fn reconcile(
        &self,
        primary: Vec<TradeRecord>,
        secondary: &SecondarySeries,
    ) -> Reconciliation {
        let mut by_instrument: BTreeMap<String, Vec<TradeRecord>> = BTreeMap::new();
        for record in primary {
            by_instrument
                .entry(record.instrument.clone())
                .or_default()
                .push(record);
        }

        let mut result = Reconciliation::default();

        for (instrument, mut records) in by_instrument {
            records.sort_by_key(|r| r.date);
            let symbol = self.symbols.secondary_symbol(&instrument);

            let closes = match secondary.get(&symbol) {
                Some(Ok(points)) => {
                    let (closes, duplicates) = index_by_date(points);
                    if duplicates > 0 {
                        debug!(%instrument, %symbol, duplicates, "duplicate secondary dates, first value kept");
                    }
                    result.duplicate_dates += duplicates;
                    closes
                }
                Some(Err(err)) => {
                    result.unmatched.push(Unmatched {
                        instrument: instrument.clone(),
                        symbol: symbol.clone(),
                        reason: UnmatchedReason::Failed(err.clone()),
                    });
                    HashMap::new()
                }
                None => {
                    result.unmatched.push(Unmatched {
                        instrument: instrument.clone(),
                        symbol: symbol.clone(),
                        reason: UnmatchedReason::Missing,
                    });
                    HashMap::new()
                }
            };

            result.rows.extend(records.into_iter().map(|record| ReconciledRow {
                adj_close: closes.get(&record.date).copied(),
                record,
            }));
        }

        result
    }
}

/// Date → adjusted close, keeping the first value per date.
fn index_by_date(points: &[AdjustedPricePoint]) -> (HashMap<NaiveDate, f64>, usize) {
    let mut closes = HashMap::with_capacity(points.len());
    let mut duplicates = 0;
    for point in points {
        if closes.contains_key(&point.date) {
            duplicates += 1;
        } else {
            closes.insert(point.date, point.adj_close);
        }
    }
    (closes, duplicates)
}
