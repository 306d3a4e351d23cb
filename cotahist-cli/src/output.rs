//! CSV rendering of reconciled rows.

use anyhow::Result;
use cotahist_runner::QueryResult;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    ticker: &'a str,
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    adj_close: Option<f64>,
    volume: u64,
    turnover: f64,
}

/// Write `result.rows` as CSV with a header line. Absent adjusted closes are
/// empty fields.
pub fn write_csv<W: Write>(writer: W, result: &QueryResult) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in &result.rows {
        let record = &row.record;
        csv.serialize(CsvRow {
            ticker: &record.instrument,
            date: record.date.format("%Y-%m-%d").to_string(),
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            adj_close: row.adj_close,
            volume: record.volume,
            turnover: record.turnover,
        })?;
    }
    if result.rows.is_empty() {
        csv.write_record([
            "ticker", "date", "open", "high", "low", "close", "adj_close", "volume", "turnover",
        ])?;
    }
    csv.flush()?;
    Ok(())
}
