//! End-to-end query scenarios.
//!
//! The origin is either the real HTTP source against a loopback server or an
//! in-memory fake; the secondary source is always an in-memory fake.

use chrono::NaiveDate;
use cotahist_core::data::{
    AdjustedCloseSource, BulkFileSource, CotahistHttpSource, DayFile, FetchError, OriginOptions,
    SourceError,
};
use cotahist_core::domain::AdjustedPricePoint;
use cotahist_core::test_utils::{
    bulk_file, day_archive, with_declared_size, QuoteLineBuilder, StubResponse, StubServer,
};
use cotahist_runner::{FeedConfig, Pipeline, PipelineError, Query, RangeFetcher, UnmatchedReason};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn quote(code: &str, day: NaiveDate, close: &str) -> String {
    QuoteLineBuilder::quote(code, &day.format("%Y%m%d").to_string())
        .set(cotahist_core::data::Field::Close, close)
        .build()
}

/// Fake secondary source: fixed series per symbol, counting calls.
struct FakeSecondary {
    series: HashMap<String, Result<Vec<AdjustedPricePoint>, SourceError>>,
    calls: AtomicUsize,
}

impl FakeSecondary {
    fn new(series: Vec<(&str, Result<Vec<(NaiveDate, f64)>, SourceError>)>) -> Self {
        Self {
            series: series
                .into_iter()
                .map(|(symbol, points)| {
                    let points = points.map(|pts| {
                        pts.into_iter()
                            .map(|(date, adj_close)| AdjustedPricePoint {
                                symbol: symbol.to_string(),
                                date,
                                adj_close,
                            })
                            .collect()
                    });
                    (symbol.to_string(), points)
                })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl AdjustedCloseSource for FakeSecondary {
    fn name(&self) -> &str {
        "fake_secondary"
    }

    fn fetch_adjusted(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<AdjustedPricePoint>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.series
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| {
                Err(SourceError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            })
    }
}

/// In-memory origin where a listed date either has a file or fails.
struct FakeOrigin {
    files: HashMap<NaiveDate, Option<Vec<u8>>>,
}

impl BulkFileSource for FakeOrigin {
    fn name(&self) -> &str {
        "fake_origin"
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<DayFile, FetchError> {
        match self.files.get(&date) {
            Some(Some(raw)) => Ok(DayFile::Published(raw.clone())),
            Some(None) => Err(FetchError::Transport {
                url: format!("fake://{date}"),
                message: "connection reset by peer".into(),
            }),
            None => Ok(DayFile::NotPublished),
        }
    }
}

fn config() -> FeedConfig {
    let mut config = FeedConfig::default();
    config.pool.workers = 3;
    config
}

// ── Five business days, one never published ──────────────────────────

#[test]
fn abcd3_over_five_days_with_one_missing_file() {
    let days = [
        date(2024, 3, 4),
        date(2024, 3, 5),
        date(2024, 3, 6),
        date(2024, 3, 7),
        date(2024, 3, 8),
    ];
    let missing = date(2024, 3, 6);

    let routes = days
        .iter()
        .filter(|d| **d != missing)
        .map(|d| {
            let lines = vec![quote("ABCD3", *d, "1500"), quote("WXYZ4", *d, "900")];
            (
                format!("/InstDados/SerHist/{}", CotahistHttpSource::file_name(*d)),
                StubResponse::ok(day_archive(&d.format("%d%m%Y").to_string(), &lines)),
            )
        })
        .collect();
    let server = StubServer::start(routes);

    let origin = CotahistHttpSource::new(&OriginOptions {
        base_url: server.base_url().to_string(),
        timeout: Duration::from_secs(5),
        ..OriginOptions::default()
    })
    .unwrap();
    // secondary is missing Mar 8
    let secondary = FakeSecondary::new(vec![(
        "ABCD3.SA",
        Ok(vec![
            (date(2024, 3, 4), 14.1),
            (date(2024, 3, 5), 14.2),
            (date(2024, 3, 7), 14.4),
        ]),
    )]);

    let pipeline = Pipeline::with_sources(
        Arc::new(origin),
        Some(Arc::new(secondary)),
        &config(),
    )
    .unwrap();
    let result = pipeline
        .run(&Query::new(vec!["abcd3".into()], days[0], days[4]))
        .unwrap();

    assert_eq!(result.days_requested, 5);
    assert_eq!(result.unpublished_days, vec![missing]);
    assert!(result.failed_days.is_empty());
    assert!(result.is_complete());

    let got: Vec<(NaiveDate, Option<f64>)> =
        result.rows.iter().map(|r| (r.date(), r.adj_close)).collect();
    assert_eq!(
        got,
        vec![
            (date(2024, 3, 4), Some(14.1)),
            (date(2024, 3, 5), Some(14.2)),
            (date(2024, 3, 7), Some(14.4)),
            (date(2024, 3, 8), None),
        ]
    );
    assert!(result.rows.iter().all(|r| r.instrument() == "ABCD3"));
    assert!(result.rows.iter().all(|r| r.record.close == 15.0));
    assert!(result.unmatched.is_empty());
}

// ── Failure isolation ────────────────────────────────────────────────

#[test]
fn transport_failure_on_one_day_keeps_the_rest() {
    let d1 = date(2024, 3, 4);
    let d2 = date(2024, 3, 5);
    let d3 = date(2024, 3, 6);
    let origin = FakeOrigin {
        files: [
            (d1, Some(bulk_file(&[quote("PETR4", d1, "3800")]))),
            (d2, None),
            (d3, Some(bulk_file(&[quote("PETR4", d3, "3900")]))),
        ]
        .into_iter()
        .collect(),
    };

    let pipeline = Pipeline::with_sources(Arc::new(origin), None, &config()).unwrap();
    let result = pipeline
        .run(&Query::new(vec!["PETR4".into()], d1, d3))
        .unwrap();

    let dates: Vec<_> = result.rows.iter().map(|r| r.date()).collect();
    assert_eq!(dates, vec![d1, d3]);
    assert_eq!(result.failed_days.len(), 1);
    assert_eq!(result.failed_days[0].0, d2);
    assert!(result.failed_days[0].1.contains("connection reset"));
    assert!(!result.is_complete());
}

#[test]
fn archive_claiming_a_huge_entry_fails_only_its_day() {
    let good = date(2024, 3, 4);
    let corrupt = date(2024, 3, 5);
    let archive = |d: NaiveDate| {
        day_archive(&d.format("%d%m%Y").to_string(), &[quote("PETR4", d, "3800")])
    };
    let server = StubServer::start(vec![
        (
            format!("/InstDados/SerHist/{}", CotahistHttpSource::file_name(good)),
            StubResponse::ok(archive(good)),
        ),
        (
            format!("/InstDados/SerHist/{}", CotahistHttpSource::file_name(corrupt)),
            StubResponse::ok(with_declared_size(&archive(corrupt), u32::MAX - 1)),
        ),
    ]);
    let origin = CotahistHttpSource::new(&OriginOptions {
        base_url: server.base_url().to_string(),
        timeout: Duration::from_secs(5),
        ..OriginOptions::default()
    })
    .unwrap();

    let fetcher = RangeFetcher::new(Arc::new(origin), 2).unwrap();
    assert_eq!(fetcher.workers(), 2);
    let wanted: HashSet<String> = ["PETR4".to_string()].into_iter().collect();
    let report = fetcher.fetch_range(&[good, corrupt], &wanted);

    let dates: Vec<_> = report.records().map(|r| r.date).collect();
    assert_eq!(dates, vec![good]);
    let failed = report.failed_days();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, corrupt);
    assert!(failed[0].1.contains("limit"));
}

#[test]
fn failing_secondary_degrades_to_none_per_instrument() {
    let d1 = date(2024, 3, 4);
    let origin = FakeOrigin {
        files: [(
            d1,
            Some(bulk_file(&[
                quote("PETR4", d1, "3800"),
                quote("VALE3", d1, "6500"),
            ])),
        )]
        .into_iter()
        .collect(),
    };
    let secondary = FakeSecondary::new(vec![
        ("PETR4.SA", Ok(vec![(d1, 33.0)])),
        (
            "VALE3.SA",
            Err(SourceError::Status {
                symbol: "VALE3.SA".into(),
                status: 502,
            }),
        ),
    ]);

    let pipeline =
        Pipeline::with_sources(Arc::new(origin), Some(Arc::new(secondary)), &config()).unwrap();
    let result = pipeline
        .run(&Query::new(vec!["PETR4".into(), "VALE3".into()], d1, d1))
        .unwrap();

    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0].adj_close, Some(33.0));
    assert_eq!(result.rows[1].adj_close, None);
    assert_eq!(result.unmatched.len(), 1);
    assert_eq!(result.unmatched[0].instrument, "VALE3");
    assert!(matches!(
        result.unmatched[0].reason,
        UnmatchedReason::Failed(SourceError::Status { status: 502, .. })
    ));
}

#[test]
fn secondary_is_only_asked_for_instruments_with_records() {
    let d1 = date(2024, 3, 4);
    let origin = FakeOrigin {
        files: [(d1, Some(bulk_file(&[quote("PETR4", d1, "3800")])))]
            .into_iter()
            .collect(),
    };
    let secondary = Arc::new(FakeSecondary::new(vec![("PETR4.SA", Ok(vec![(d1, 33.0)]))]));

    let pipeline = Pipeline::with_sources(
        Arc::new(origin),
        Some(Arc::clone(&secondary) as Arc<dyn AdjustedCloseSource>),
        &config(),
    )
    .unwrap();
    let result = pipeline
        .run(&Query::new(vec!["PETR4".into(), "NOPE3".into()], d1, d1))
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn without_adjusted_skips_secondary() {
    let d1 = date(2024, 3, 4);
    let origin = FakeOrigin {
        files: [(d1, Some(bulk_file(&[quote("PETR4", d1, "3800")])))]
            .into_iter()
            .collect(),
    };
    let secondary = Arc::new(FakeSecondary::new(vec![]));

    let pipeline = Pipeline::with_sources(
        Arc::new(origin),
        Some(Arc::clone(&secondary) as Arc<dyn AdjustedCloseSource>),
        &config(),
    )
    .unwrap();
    let result = pipeline
        .run(&Query::new(vec!["PETR4".into()], d1, d1).without_adjusted())
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].adj_close, None);
    assert!(result.unmatched.is_empty());
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
}

// ── Output filtering ──────────────────────────────────────────────────

#[test]
fn rows_outside_requested_days_are_discarded() {
    let d1 = date(2024, 3, 4);
    // a file that also carries a stale line dated the previous Friday
    let origin = FakeOrigin {
        files: [(
            d1,
            Some(bulk_file(&[
                quote("PETR4", date(2024, 3, 1), "3700"),
                quote("PETR4", d1, "3800"),
            ])),
        )]
        .into_iter()
        .collect(),
    };

    let pipeline = Pipeline::with_sources(Arc::new(origin), None, &config()).unwrap();
    let result = pipeline
        .run(&Query::new(vec!["PETR4".into()], d1, d1))
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].date(), d1);
}

#[test]
fn holiday_only_range_requests_nothing() {
    // Carnival Monday and Tuesday 2024
    let origin = FakeOrigin {
        files: HashMap::new(),
    };
    let pipeline = Pipeline::with_sources(Arc::new(origin), None, &config()).unwrap();
    let result = pipeline
        .run(&Query::new(vec!["PETR4".into()], date(2024, 2, 12), date(2024, 2, 13)))
        .unwrap();

    assert_eq!(result.days_requested, 0);
    assert!(result.rows.is_empty());
    assert!(result.unpublished_days.is_empty());
}

// ── Query validation ─────────────────────────────────────────────────

#[test]
fn empty_instrument_list_is_rejected() {
    let origin = FakeOrigin {
        files: HashMap::new(),
    };
    let pipeline = Pipeline::with_sources(Arc::new(origin), None, &config()).unwrap();
    let err = pipeline
        .run(&Query::new(vec!["  ".into()], date(2024, 3, 4), date(2024, 3, 4)))
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoInstruments));
}

#[test]
fn inverted_range_is_rejected() {
    let origin = FakeOrigin {
        files: HashMap::new(),
    };
    let pipeline = Pipeline::with_sources(Arc::new(origin), None, &config()).unwrap();
    let err = pipeline
        .run(&Query::new(vec!["PETR4".into()], date(2024, 3, 8), date(2024, 3, 4)))
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvertedRange { .. }));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let origin = FakeOrigin {
        files: HashMap::new(),
    };
    let mut config = config();
    config.pool.workers = 0;
    assert!(matches!(
        Pipeline::with_sources(Arc::new(origin), None, &config),
        Err(PipelineError::Config(_))
    ));
}
