//! cotahist runner: range fetching, reconciliation and the query pipeline.
//!
//! This crate builds on `cotahist-core` to provide:
//! - TOML feed configuration with defaults for every field
//! - Range fetching over a private bounded worker pool, with per-day outcomes
//! - Reconciliation of trade records against adjusted-close series
//! - The end-to-end query pipeline

pub mod config;
pub mod pipeline;
pub mod range;
pub mod reconcile;

pub use config::{ConfigError, FeedConfig};
pub use pipeline::{Pipeline, PipelineError, Query, QueryResult};
pub use range::{DayOutcome, DayReport, RangeError, RangeFetcher, RangeReport};
pub use reconcile::{
    Reconciler, Reconciliation, SecondarySeries, SymbolMap, Unmatched, UnmatchedReason,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn fetcher_and_pipeline_are_send_sync() {
        assert_send::<RangeFetcher>();
        assert_sync::<RangeFetcher>();
        assert_send::<Pipeline>();
        assert_sync::<Pipeline>();
    }

    #[test]
    fn results_are_send_sync() {
        assert_send::<RangeReport>();
        assert_sync::<RangeReport>();
        assert_send::<QueryResult>();
        assert_sync::<QueryResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<FeedConfig>();
        assert_sync::<FeedConfig>();
    }
}
