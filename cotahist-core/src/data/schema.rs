//! COTAHIST fixed-width layout.
//!
//! Each quote line is 245 characters, fields identified only by position.
//! Offsets are the running sum of the widths in [`LAYOUT`], so the table
//! order is load-bearing: a wrong width shifts every field after it.

use std::ops::Range;

/// Named fields of a quote line, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    RecordType,
    TradeDate,
    BdiCode,
    InstrumentCode,
    MarketType,
    IssuerAbbreviation,
    Specification,
    TermDays,
    Currency,
    Open,
    High,
    Low,
    Average,
    Close,
    BestBid,
    BestAsk,
    TradeCount,
    Quantity,
    FinancialVolume,
    StrikePrice,
    CorrectionIndicator,
    ExpirationDate,
    QuotationFactor,
    StrikeInPoints,
    Isin,
    DistributionNumber,
}

/// Field order and width in characters.
pub const LAYOUT: [(Field, usize); 26] = [
    (Field::RecordType, 2),
    (Field::TradeDate, 8),
    (Field::BdiCode, 2),
    (Field::InstrumentCode, 12),
    (Field::MarketType, 3),
    (Field::IssuerAbbreviation, 12),
    (Field::Specification, 10),
    (Field::TermDays, 3),
    (Field::Currency, 4),
    (Field::Open, 13),
    (Field::High, 13),
    (Field::Low, 13),
    (Field::Average, 13),
    (Field::Close, 13),
    (Field::BestBid, 13),
    (Field::BestAsk, 13),
    (Field::TradeCount, 5),
    (Field::Quantity, 18),
    (Field::FinancialVolume, 18),
    (Field::StrikePrice, 13),
    (Field::CorrectionIndicator, 1),
    (Field::ExpirationDate, 8),
    (Field::QuotationFactor, 7),
    (Field::StrikeInPoints, 13),
    (Field::Isin, 12),
    (Field::DistributionNumber, 3),
];

/// Total width of a quote line.
pub const LINE_WIDTH: usize = {
    let mut total = 0;
    let mut i = 0;
    while i < LAYOUT.len() {
        total += LAYOUT[i].1;
        i += 1;
    }
    total
};

/// Record type of a quote line; `00` is the file header and `99` the trailer.
pub const QUOTE_RECORD_TYPE: &str = "01";

/// Price-like fields are integers scaled by this factor.
pub const PRICE_SCALE: f64 = 100.0;

impl Field {
    /// Position of this field in [`LAYOUT`].
    const fn index(self) -> usize {
        self as usize
    }

    pub const fn width(self) -> usize {
        LAYOUT[self.index()].1
    }

    pub const fn offset(self) -> usize {
        let mut offset = 0;
        let mut i = 0;
        while i < self.index() {
            offset += LAYOUT[i].1;
            i += 1;
        }
        offset
    }

    /// Byte range of this field within a line.
    pub const fn span(self) -> Range<usize> {
        let start = self.offset();
        start..start + self.width()
    }
}
