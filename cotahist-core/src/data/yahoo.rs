//! Yahoo Finance adjusted-close source.
//!
//! Reads the `adjclose` series from Yahoo's v8 chart API. Yahoo has no
//! official API and is subject to unannounced format changes; anything
//! unexpected surfaces as [`SourceError::ResponseFormatChanged`].

use super::provider::{AdjustedCloseSource, SourceError};
use crate::domain::AdjustedPricePoint;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_YAHOO_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds; daily bars are stamped at the
    /// local session open.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Connection settings for [`YahooAdjustedSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct YahooOptions {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for YahooOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_YAHOO_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct YahooAdjustedSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooAdjustedSource {
    pub fn new(options: &YahooOptions) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive; cover the whole end day
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url
        )
    }
}

/// Parse the chart API body into adjusted-close points, skipping nulls.
fn parse_chart(symbol: &str, body: &str) -> Result<Vec<AdjustedPricePoint>, SourceError> {
    let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
        SourceError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
    })?;

    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => SourceError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => SourceError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => SourceError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::ResponseFormatChanged("result array is empty".into()))?;

    // A symbol with no bars in range has no timestamp array at all
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .ok_or_else(|| SourceError::ResponseFormatChanged("no adjclose series".into()))?;

    let offset = data.meta.map_or(0, |m| m.gmtoffset);
    let mut points = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(adj_close) = adj_closes.get(i).copied().flatten() else {
            continue;
        };
        let date = ts
            .checked_add(offset)
            .and_then(|local| DateTime::from_timestamp(local, 0))
            .map(|dt| dt.date_naive())
            .ok_or_else(|| SourceError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        points.push(AdjustedPricePoint {
            symbol: symbol.to_string(),
            date,
            adj_close,
        });
    }

    Ok(points)
}

impl AdjustedCloseSource for YahooAdjustedSource {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_adjusted(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AdjustedPricePoint>, SourceError> {
        let url = self.chart_url(symbol, start, end);
        debug!(%symbol, %url, "fetching adjusted closes");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SourceError::NetworkUnreachable(e.to_string()))?;
        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .map_err(|e| SourceError::NetworkUnreachable(e.to_string()))?;
        parse_chart(symbol, &body)
    }
}
