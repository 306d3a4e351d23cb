//! Fetch and parse a range of business days over a bounded worker pool.
//!
//! Each day is one task (download, extract, parse). Tasks are independent:
//! a failed day is recorded in the report and never affects the others.

use chrono::NaiveDate;
use cotahist_core::data::{self, BulkFileSource, DayFile, DroppedLines};
use cotahist_core::domain::TradeRecord;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RangeError {
    #[error("worker pool needs at least one thread")]
    NoWorkers,

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// What happened to one requested day.
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    /// The file was published and parsed. `records` may be empty if none of
    /// the requested instruments traded that day.
    Available {
        records: Vec<TradeRecord>,
        dropped: DroppedLines,
    },
    /// The origin has no file for this day.
    NotPublished,
    /// Transport or archive failure.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayReport {
    pub date: NaiveDate,
    pub outcome: DayOutcome,
}

/// Per-day outcomes of a range fetch, ordered by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeReport {
    pub days: Vec<DayReport>,
}

impl RangeReport {
    /// All records across available days, in date order.
    pub fn records(&self) -> impl Iterator<Item = &TradeRecord> {
        self.days.iter().flat_map(|day| match &day.outcome {
            DayOutcome::Available { records, .. } => records.as_slice(),
            _ => &[][..],
        })
    }

    pub fn into_records(self) -> Vec<TradeRecord> {
        self.days
            .into_iter()
            .flat_map(|day| match day.outcome {
                DayOutcome::Available { records, .. } => records,
                _ => Vec::new(),
            })
            .collect()
    }

    /// Days that failed, with the reason.
    pub fn failed_days(&self) -> Vec<(NaiveDate, String)> {
        self.days
            .iter()
            .filter_map(|day| match &day.outcome {
                DayOutcome::Failed { reason } => Some((day.date, reason.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn unpublished_days(&self) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|day| day.outcome == DayOutcome::NotPublished)
            .map(|day| day.date)
            .collect()
    }

    /// Dropped-line diagnostics merged across all available days.
    pub fn dropped_lines(&self) -> DroppedLines {
        let mut total = DroppedLines::default();
        for day in &self.days {
            if let DayOutcome::Available { dropped, .. } = &day.outcome {
                total.merge(dropped);
            }
        }
        total
    }

    pub fn dropped_line_count(&self) -> usize {
        self.days
            .iter()
            .map(|day| match &day.outcome {
                DayOutcome::Available { dropped, .. } => dropped.count,
                _ => 0,
            })
            .sum()
    }
}

/// Runs day tasks on a private pool built once and reused for every call.
pub struct RangeFetcher {
    source: Arc<dyn BulkFileSource>,
    pool: rayon::ThreadPool,
    workers: usize,
}

impl RangeFetcher {
    pub fn new(source: Arc<dyn BulkFileSource>, workers: usize) -> Result<Self, RangeError> {
        if workers == 0 {
            return Err(RangeError::NoWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("cotahist-fetch-{i}"))
            .build()?;
        Ok(Self {
            source,
            pool,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The worker pool, for running other bounded work (secondary fetches)
    /// under the same concurrency limit.
    pub fn pool(&self) -> &rayon::ThreadPool {
        &self.pool
    }

    /// Fetch and parse every day in `days`, keeping only `instruments`.
    pub fn fetch_range(&self, days: &[NaiveDate], instruments: &HashSet<String>) -> RangeReport {
        info!(
            days = days.len(),
            instruments = instruments.len(),
            workers = self.workers,
            source = self.source.name(),
            "fetching range"
        );

        let mut reports: Vec<DayReport> = self.pool.install(|| {
            days.par_iter()
                .map(|&date| self.fetch_day(date, instruments))
                .collect()
        });
        reports.sort_by_key(|report| report.date);

        let report = RangeReport { days: reports };
        info!(
            records = report.records().count(),
            failed = report.failed_days().len(),
            unpublished = report.unpublished_days().len(),
            dropped_lines = report.dropped_line_count(),
            "range complete"
        );
        report
    }

    /// One unit of work: download, extract and parse a single day.
    pub fn fetch_day(&self, date: NaiveDate, instruments: &HashSet<String>) -> DayReport {
        let outcome = match self.source.fetch_day(date) {
            Ok(DayFile::Published(raw)) => {
                let parsed = data::parse(&raw, instruments);
                if !parsed.dropped.is_empty() {
                    warn!(%date, dropped = parsed.dropped.count, "dropped malformed lines");
                }
                debug!(%date, records = parsed.records.len(), "parsed day");
                DayOutcome::Available {
                    records: parsed.records,
                    dropped: parsed.dropped,
                }
            }
            Ok(DayFile::NotPublished) => {
                debug!(%date, "no file published");
                DayOutcome::NotPublished
            }
            Err(err) => {
                warn!(%date, error = %err, "day fetch failed");
                DayOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };
        DayReport { date, outcome }
    }
}
