//! cotahist core: domain types, the B3 trading calendar, the COTAHIST
//! fixed-width parser and the upstream source adapters.
//!
//! - Domain types (trade records, adjusted closes, reconciled rows)
//! - Business-day calendar with Easter-derived holidays
//! - Filter-first fixed-width decoder with dropped-line diagnostics
//! - HTTP origin for daily bulk archives and the Yahoo adjusted-close source

pub mod calendar;
pub mod data;
pub mod domain;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
