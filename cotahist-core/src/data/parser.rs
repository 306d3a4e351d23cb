//! Quote-line decoder for COTAHIST payloads.
//!
//! Bulk files carry every listed instrument while callers usually want a
//! handful, so the instrument code is sliced and checked first and every
//! other line is skipped before any field is decoded.

use super::schema::{Field, LINE_WIDTH, PRICE_SCALE, QUOTE_RECORD_TYPE};
use crate::domain::TradeRecord;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

/// Samples kept per payload for dropped-line diagnostics.
pub const MAX_DROPPED_SAMPLES: usize = 5;

/// Why a wanted line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("line is {len} characters, expected {}", LINE_WIDTH)]
    Short { len: usize },

    #[error("record type {0:?} is not a quote line")]
    RecordType(String),

    #[error("{field:?} is not a number: {value:?}")]
    Number { field: Field, value: String },

    #[error("{field:?} is not a YYYYMMDD date: {value:?}")]
    Date { field: Field, value: String },
}

/// A line that passed the instrument filter but failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedLine {
    /// 1-based line number within the payload.
    pub line_number: usize,
    pub instrument: String,
    pub reason: LineError,
}

/// Count and a bounded sample of dropped lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DroppedLines {
    pub count: usize,
    pub samples: Vec<DroppedLine>,
}

impl DroppedLines {
    fn push(&mut self, line: DroppedLine) {
        self.count += 1;
        if self.samples.len() < MAX_DROPPED_SAMPLES {
            self.samples.push(line);
        }
    }

    /// Fold another payload's diagnostics into this one.
    pub fn merge(&mut self, other: &DroppedLines) {
        self.count += other.count;
        let room = MAX_DROPPED_SAMPLES.saturating_sub(self.samples.len());
        self.samples
            .extend(other.samples.iter().take(room).cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Decoded records of one payload plus what was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPayload {
    pub records: Vec<TradeRecord>,
    pub dropped: DroppedLines,
}

/// Decode the lines of `raw` whose instrument code is in `wanted`.
///
/// Never fails: lines for other instruments (including the header and
/// trailer) are skipped, wanted lines that do not decode are counted in
/// [`ParsedPayload::dropped`].
pub fn parse(raw: &[u8], wanted: &HashSet<String>) -> ParsedPayload {
    let mut payload = ParsedPayload::default();

    for (index, line) in raw.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(code) = instrument_code(line) else {
            continue;
        };
        if !wanted.contains(code) {
            continue;
        }

        match decode_line(line) {
            Ok(record) => payload.records.push(record),
            Err(reason) => payload.dropped.push(DroppedLine {
                line_number: index + 1,
                instrument: code.to_string(),
                reason,
            }),
        }
    }

    payload
}

/// Trimmed instrument code, or `None` if the line is too short to hold one.
fn instrument_code(line: &[u8]) -> Option<&str> {
    let raw = line.get(Field::InstrumentCode.span())?;
    std::str::from_utf8(raw).ok().map(str::trim)
}

/// Decode a full quote line into a [`TradeRecord`].
pub fn decode_line(line: &[u8]) -> Result<TradeRecord, LineError> {
    if line.len() < LINE_WIDTH {
        return Err(LineError::Short { len: line.len() });
    }
    let fields = LineFields { line };

    let record_type = fields.text(Field::RecordType);
    if record_type != QUOTE_RECORD_TYPE {
        return Err(LineError::RecordType(record_type));
    }

    Ok(TradeRecord {
        instrument: fields.text(Field::InstrumentCode),
        date: fields.date(Field::TradeDate)?,
        open: fields.price(Field::Open)?,
        high: fields.price(Field::High)?,
        low: fields.price(Field::Low)?,
        close: fields.price(Field::Close)?,
        volume: fields.number(Field::Quantity)?,
        turnover: fields.price(Field::FinancialVolume)?,
        bdi_code: fields.text(Field::BdiCode),
        market_type: fields.number(Field::MarketType)?,
        issuer: fields.text(Field::IssuerAbbreviation),
        specification: fields.text(Field::Specification),
        term_days: fields.optional_number(Field::TermDays)?,
        currency: fields.text(Field::Currency),
        average: fields.price(Field::Average)?,
        best_bid: fields.price(Field::BestBid)?,
        best_ask: fields.price(Field::BestAsk)?,
        trades: fields.number(Field::TradeCount)?,
        strike: fields.price(Field::StrikePrice)?,
        correction_indicator: fields.number(Field::CorrectionIndicator)?,
        expiration: fields.optional_date(Field::ExpirationDate)?,
        quotation_factor: fields.number(Field::QuotationFactor)?,
        strike_points: fields.price(Field::StrikeInPoints)?,
        isin: fields.text(Field::Isin),
        distribution: fields.number(Field::DistributionNumber)?,
    })
}

/// Field accessor over a line already checked to be [`LINE_WIDTH`] long.
struct LineFields<'a> {
    line: &'a [u8],
}

impl LineFields<'_> {
    fn raw(&self, field: Field) -> &[u8] {
        &self.line[field.span()]
    }

    /// ISO-8859-1 maps each byte to the code point of the same value.
    fn text(&self, field: Field) -> String {
        let decoded: String = self.raw(field).iter().map(|&b| char::from(b)).collect();
        decoded.trim().to_string()
    }

    fn ascii(&self, field: Field) -> Result<&str, LineError> {
        let raw = self.raw(field);
        std::str::from_utf8(raw)
            .map(str::trim)
            .map_err(|_| LineError::Number {
                field,
                value: String::from_utf8_lossy(raw).into_owned(),
            })
    }

    fn number<T: FromStr>(&self, field: Field) -> Result<T, LineError> {
        let value = self.ascii(field)?;
        value.parse().map_err(|_| LineError::Number {
            field,
            value: value.to_string(),
        })
    }

    fn optional_number<T: FromStr>(&self, field: Field) -> Result<Option<T>, LineError> {
        if self.ascii(field)?.is_empty() {
            return Ok(None);
        }
        self.number(field).map(Some)
    }

    fn price(&self, field: Field) -> Result<f64, LineError> {
        let scaled: i64 = self.number(field)?;
        Ok(scaled as f64 / PRICE_SCALE)
    }

    fn date(&self, field: Field) -> Result<NaiveDate, LineError> {
        let value = self.ascii(field)?;
        NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| LineError::Date {
            field,
            value: value.to_string(),
        })
    }

    fn optional_date(&self, field: Field) -> Result<Option<NaiveDate>, LineError> {
        if self.ascii(field)?.is_empty() {
            return Ok(None);
        }
        self.date(field).map(Some)
    }
}
