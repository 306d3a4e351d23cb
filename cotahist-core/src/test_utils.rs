//! Fixture builders for COTAHIST payloads.
//!
//! Available to this crate's tests and, through the `test-utils` feature, to
//! downstream crates' tests.

use crate::data::schema::{Field, LAYOUT, LINE_WIDTH};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use zip::write::SimpleFileOptions;

/// Builds one 245-character quote line.
///
/// Numeric fields are right-aligned and zero-padded, text fields are
/// left-aligned and space-padded. Values longer than the field are cut.
#[derive(Debug, Clone)]
pub struct QuoteLineBuilder {
    values: HashMap<Field, String>,
}

impl QuoteLineBuilder {
    /// A plausible cash-market quote line for `instrument` on `date`
    /// (`YYYYMMDD`).
    pub fn quote(instrument: &str, date: &str) -> Self {
        let defaults = [
            (Field::RecordType, "01"),
            (Field::TradeDate, date),
            (Field::BdiCode, "02"),
            (Field::InstrumentCode, instrument),
            (Field::MarketType, "010"),
            (Field::IssuerAbbreviation, "EMPRESA"),
            (Field::Specification, "ON      NM"),
            (Field::Currency, "R$"),
            (Field::Open, "1000"),
            (Field::High, "1100"),
            (Field::Low, "950"),
            (Field::Average, "1025"),
            (Field::Close, "1050"),
            (Field::BestBid, "1049"),
            (Field::BestAsk, "1051"),
            (Field::TradeCount, "1200"),
            (Field::Quantity, "500000"),
            (Field::FinancialVolume, "512500000"),
            (Field::StrikePrice, "0"),
            (Field::CorrectionIndicator, "0"),
            (Field::ExpirationDate, "99991231"),
            (Field::QuotationFactor, "1"),
            (Field::StrikeInPoints, "0"),
            (Field::Isin, "BRXXXXACNOR0"),
            (Field::DistributionNumber, "100"),
        ];
        Self {
            values: defaults
                .into_iter()
                .map(|(field, value)| (field, value.to_string()))
                .collect(),
        }
    }

    /// Override one field.
    pub fn set(mut self, field: Field, value: &str) -> Self {
        self.values.insert(field, value.to_string());
        self
    }

    /// Blank one field (all spaces).
    pub fn clear(mut self, field: Field) -> Self {
        self.values.remove(&field);
        self
    }

    pub fn build(&self) -> String {
        let mut line = String::with_capacity(LINE_WIDTH);
        for (field, width) in LAYOUT {
            let value = self.values.get(&field).map_or("", String::as_str);
            let value: String = value.chars().take(width).collect();
            if value.is_empty() {
                line.push_str(&" ".repeat(width));
            } else if is_text(field) {
                line.push_str(&format!("{value:<width$}"));
            } else {
                line.push_str(&format!("{value:0>width$}"));
            }
        }
        line
    }

    /// The `00` header line of a bulk file.
    pub fn header() -> String {
        format!("{:<LINE_WIDTH$}", "00COTAHIST.2024BOVESPA 20240301")
    }

    /// The `99` trailer line with the file's total line count.
    pub fn trailer(total_lines: usize) -> String {
        format!(
            "{:<LINE_WIDTH$}",
            format!("99COTAHIST.2024BOVESPA 20240301{total_lines:011}")
        )
    }
}

fn is_text(field: Field) -> bool {
    matches!(
        field,
        Field::RecordType
            | Field::BdiCode
            | Field::InstrumentCode
            | Field::IssuerAbbreviation
            | Field::Specification
            | Field::Currency
            | Field::Isin
    )
}

/// A bulk file body: header, `lines`, trailer, CRLF-terminated.
pub fn bulk_file(lines: &[String]) -> Vec<u8> {
    let mut body = String::new();
    body.push_str(&QuoteLineBuilder::header());
    body.push_str("\r\n");
    for line in lines {
        body.push_str(line);
        body.push_str("\r\n");
    }
    body.push_str(&QuoteLineBuilder::trailer(lines.len() + 2));
    body.push_str("\r\n");
    body.into_bytes()
}

/// An in-memory deflated zip archive with the given entries.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Rewrite the uncompressed size every central-directory header declares.
///
/// The entry data is untouched, so the archive still opens; only what it
/// claims about itself changes.
pub fn with_declared_size(archive: &[u8], size: u32) -> Vec<u8> {
    const CENTRAL_HEADER: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
    const UNCOMPRESSED_SIZE_AT: usize = 24;

    let mut patched = archive.to_vec();
    let starts: Vec<usize> = patched
        .windows(CENTRAL_HEADER.len())
        .enumerate()
        .filter(|(_, window)| *window == CENTRAL_HEADER)
        .map(|(at, _)| at)
        .collect();
    assert!(!starts.is_empty(), "no central directory header");
    for at in starts {
        let field = at + UNCOMPRESSED_SIZE_AT;
        patched[field..field + 4].copy_from_slice(&size.to_le_bytes());
    }
    patched
}

/// A single-entry archive as the origin publishes it for `date` (`DDMMYYYY`).
pub fn day_archive(ddmmyyyy: &str, lines: &[String]) -> Vec<u8> {
    let name = format!("COTAHIST_D{ddmmyyyy}.TXT");
    zip_archive(&[(name.as_str(), bulk_file(lines).as_slice())])
}

/// Canned HTTP response for [`StubServer`].
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}

/// Loopback HTTP/1.1 server answering GETs from a fixed path table.
///
/// Unknown paths get a 404. The accept loop runs on a detached thread for
/// the rest of the test process.
pub struct StubServer {
    base_url: String,
}

impl StubServer {
    pub fn start(routes: Vec<(String, StubResponse)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let routes: Arc<HashMap<String, StubResponse>> = Arc::new(routes.into_iter().collect());

        std::thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                std::thread::spawn(move || respond(stream, &routes));
            }
        });

        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn respond(mut stream: TcpStream, routes: &HashMap<String, StubResponse>) {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    // drain headers
    let mut header = String::new();
    while reader.read_line(&mut header).map_or(false, |n| n > 2) {
        header.clear();
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let path = path.split('?').next().unwrap_or(path);
    let not_found = StubResponse::status(404);
    let response = routes.get(path).unwrap_or(&not_found);

    let head = format!(
        "HTTP/1.1 {} STUB\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&response.body);
    let _ = stream.flush();
}
