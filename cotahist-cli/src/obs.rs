//! Logging setup. Logs go to stderr so CSV on stdout stays clean.

use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides `--log-level`.
pub const LOG_ENV: &str = "COTAHIST_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

pub fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    if filter.trim().is_empty() {
        bail!("empty log filter");
    }
    let env_filter =
        EnvFilter::try_new(&filter).map_err(|err| anyhow!("invalid log filter {filter:?}: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}
