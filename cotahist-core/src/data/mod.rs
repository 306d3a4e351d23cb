//! Data ingestion: the fixed-width schema, the quote-line parser, and the
//! two upstream sources (exchange bulk files and adjusted closes).

pub mod origin;
pub mod parser;
pub mod provider;
pub mod schema;
pub mod yahoo;

pub use origin::{CotahistHttpSource, OriginOptions};
pub use parser::{parse, DroppedLine, DroppedLines, LineError, ParsedPayload};
pub use provider::{AdjustedCloseSource, BulkFileSource, DayFile, FetchError, SourceError};
pub use schema::{Field, LINE_WIDTH};
pub use yahoo::{YahooAdjustedSource, YahooOptions};
