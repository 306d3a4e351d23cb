//! HTTP client for the exchange's daily bulk files.
//!
//! One archive per trading day at
//! `<base>/InstDados/SerHist/COTAHIST_D<DDMMYYYY>.ZIP`, each holding a
//! single fixed-width text file. A 404 means the day was never published.

use super::provider::{BulkFileSource, DayFile, FetchError};
use chrono::NaiveDate;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ORIGIN_URL: &str = "https://bvmf.bmfbovespa.com.br";

/// Upper bound on an extracted day file. Daily files are a few megabytes.
pub const MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// Connection settings for [`CotahistHttpSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct OriginOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// The origin has served incomplete certificate chains; off unless asked.
    pub accept_invalid_certs: bool,
}

impl Default for OriginOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORIGIN_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("cotahist/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_invalid_certs: false,
        }
    }
}

/// Blocking HTTP origin. The client is shared, so clone the source (or wrap
/// it in an `Arc`) rather than building one per worker.
#[derive(Debug, Clone)]
pub struct CotahistHttpSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl CotahistHttpSource {
    pub fn new(options: &OriginOptions) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// File name the origin uses for `date`.
    pub fn file_name(date: NaiveDate) -> String {
        format!("COTAHIST_D{}.ZIP", date.format("%d%m%Y"))
    }

    pub fn day_url(&self, date: NaiveDate) -> String {
        format!("{}/InstDados/SerHist/{}", self.base_url, Self::file_name(date))
    }
}

impl BulkFileSource for CotahistHttpSource {
    fn name(&self) -> &str {
        "b3_cotahist"
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<DayFile, FetchError> {
        let url = self.day_url(date);
        debug!(%date, %url, "fetching bulk file");

        let resp = self.client.get(&url).send().map_err(|e| transport(&url, e))?;
        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(DayFile::NotPublished);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = resp.bytes().map_err(|e| transport(&url, e))?;
        let payload = extract_single_entry(&body)?;
        debug!(%date, bytes = payload.len(), "extracted bulk file");
        Ok(DayFile::Published(payload))
    }
}

fn transport(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Raw bytes of the only file inside a zip archive.
pub fn extract_single_entry(archive: &[u8]) -> Result<Vec<u8>, FetchError> {
    let mut reader = zip::ZipArchive::new(Cursor::new(archive))?;
    if reader.len() != 1 {
        return Err(FetchError::UnexpectedEntries {
            entries: reader.len(),
        });
    }

    let entry = reader.by_index(0)?;
    // the declared size comes from the archive itself and may lie either way
    let declared = entry.size();
    if declared > MAX_ENTRY_BYTES {
        return Err(FetchError::EntryTooLarge {
            size: declared,
            limit: MAX_ENTRY_BYTES,
        });
    }

    let mut payload = Vec::new();
    entry.take(MAX_ENTRY_BYTES + 1).read_to_end(&mut payload)?;
    let read = payload.len() as u64;
    if read > MAX_ENTRY_BYTES {
        return Err(FetchError::EntryTooLarge {
            size: read,
            limit: MAX_ENTRY_BYTES,
        });
    }
    Ok(payload)
}
