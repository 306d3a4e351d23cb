//! End-to-end query: calendar → range fetch → secondary fetch → reconcile.

use crate::config::{ConfigError, FeedConfig};
use crate::range::{RangeError, RangeFetcher};
use crate::reconcile::{Reconciler, SecondarySeries, SymbolMap, Unmatched};
use chrono::NaiveDate;
use cotahist_core::calendar;
use cotahist_core::data::{
    AdjustedCloseSource, BulkFileSource, CotahistHttpSource, DroppedLines, FetchError,
    SourceError, YahooAdjustedSource,
};
use cotahist_core::domain::ReconciledRow;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no instruments requested")]
    NoInstruments,

    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("origin client: {0}")]
    Origin(#[from] FetchError),

    #[error("secondary client: {0}")]
    Secondary(#[from] SourceError),
}

/// Instruments and an inclusive date range.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub instruments: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Fetch and attach secondary adjusted closes.
    pub with_adjusted: bool,
}

impl Query {
    pub fn new(instruments: Vec<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            instruments,
            start,
            end,
            with_adjusted: true,
        }
    }

    pub fn without_adjusted(mut self) -> Self {
        self.with_adjusted = false;
        self
    }

    /// Trimmed, upper-cased, de-duplicated identifiers.
    fn normalized_instruments(&self) -> HashSet<String> {
        self.instruments
            .iter()
            .map(|id| id.trim().to_uppercase())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// Rows plus everything the caller needs to judge completeness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<ReconciledRow>,
    pub days_requested: usize,
    pub failed_days: Vec<(NaiveDate, String)>,
    pub unpublished_days: Vec<NaiveDate>,
    pub dropped_lines: DroppedLines,
    pub unmatched: Vec<Unmatched>,
}

impl QueryResult {
    pub fn is_complete(&self) -> bool {
        self.failed_days.is_empty()
    }
}

pub struct Pipeline {
    fetcher: RangeFetcher,
    secondary: Option<Arc<dyn AdjustedCloseSource>>,
    reconciler: Reconciler,
}

impl Pipeline {
    /// Wire the HTTP origin and, if enabled, the Yahoo source from `config`.
    pub fn new(config: &FeedConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let origin: Arc<dyn BulkFileSource> =
            Arc::new(CotahistHttpSource::new(&config.origin_options())?);
        let secondary: Option<Arc<dyn AdjustedCloseSource>> = if config.secondary.enabled {
            Some(Arc::new(YahooAdjustedSource::new(&config.yahoo_options())?))
        } else {
            None
        };
        Self::with_sources(origin, secondary, config)
    }

    /// Wire explicit sources; pool size and symbol suffix still come from
    /// `config`.
    pub fn with_sources(
        origin: Arc<dyn BulkFileSource>,
        secondary: Option<Arc<dyn AdjustedCloseSource>>,
        config: &FeedConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            fetcher: RangeFetcher::new(origin, config.pool.workers)?,
            secondary,
            reconciler: Reconciler::new(SymbolMap::new(config.secondary.symbol_suffix.as_str())),
        })
    }

    pub fn run(&self, query: &Query) -> Result<QueryResult, PipelineError> {
        let wanted = query.normalized_instruments();
        if wanted.is_empty() {
            return Err(PipelineError::NoInstruments);
        }
        if query.start > query.end {
            return Err(PipelineError::InvertedRange {
                start: query.start,
                end: query.end,
            });
        }

        let days: Vec<NaiveDate> = calendar::business_days(query.start, query.end).collect();
        info!(
            start = %query.start,
            end = %query.end,
            business_days = days.len(),
            instruments = wanted.len(),
            "running query"
        );

        let report = self.fetcher.fetch_range(&days, &wanted);
        let failed_days = report.failed_days();
        let unpublished_days = report.unpublished_days();
        let dropped_lines = report.dropped_lines();
        let records = report.into_records();

        let secondary = self.secondary.as_ref().filter(|_| query.with_adjusted);
        let mut reconciliation = match secondary {
            Some(source) => {
                let present: BTreeSet<&str> =
                    records.iter().map(|r| r.instrument.as_str()).collect();
                let series = self.fetch_secondary(source.as_ref(), &present, query);
                self.reconciler.reconcile(records, &series)
            }
            None => {
                let mut plain = self.reconciler.reconcile(records, &SecondarySeries::new());
                // nothing was requested, so nothing is unmatched
                plain.unmatched.clear();
                plain
            }
        };

        let day_set: HashSet<NaiveDate> = days.iter().copied().collect();
        reconciliation
            .rows
            .retain(|row| wanted.contains(row.instrument()) && day_set.contains(&row.date()));

        info!(
            rows = reconciliation.rows.len(),
            failed_days = failed_days.len(),
            unmatched = reconciliation.unmatched.len(),
            "query complete"
        );

        Ok(QueryResult {
            rows: reconciliation.rows,
            days_requested: days.len(),
            failed_days,
            unpublished_days,
            dropped_lines,
            unmatched: reconciliation.unmatched,
        })
    }

    /// One isolated secondary fetch per instrument, on the range pool.
    fn fetch_secondary(
        &self,
        source: &dyn AdjustedCloseSource,
        instruments: &BTreeSet<&str>,
        query: &Query,
    ) -> SecondarySeries {
        let symbols: Vec<String> = instruments
            .iter()
            .map(|id| self.reconciler.symbols().secondary_symbol(id))
            .collect();

        self.fetcher.pool().install(|| {
            symbols
                .par_iter()
                .map(|symbol| {
                    let series = source.fetch_adjusted(symbol, query.start, query.end);
                    if let Err(err) = &series {
                        warn!(%symbol, error = %err, source = source.name(), "secondary fetch failed");
                    }
                    (symbol.clone(), series)
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn instruments_are_trimmed_and_upper_cased() {
        let query = Query::new(
            vec![" petr4 ".into(), "PETR4".into(), "".into(), "vale3".into()],
            date(2024, 3, 1),
            date(2024, 3, 1),
        );
        let ids = query.normalized_instruments();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("PETR4"));
        assert!(ids.contains("VALE3"));
    }

    #[test]
    fn without_adjusted_clears_flag() {
        let query = Query::new(vec!["PETR4".into()], date(2024, 3, 1), date(2024, 3, 1));
        assert!(query.with_adjusted);
        assert!(!query.without_adjusted().with_adjusted);
    }
}
