//! cotahist CLI: fetch reconciled B3 quotes and inspect the trading calendar.
//!
//! Commands:
//! - `fetch`: download daily COTAHIST files for a date range, keep the given
//!   instruments, attach adjusted closes and write CSV
//! - `calendar holidays`: list the exchange holidays of a year
//! - `calendar days`: list the business days in a range

mod obs;
mod output;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cotahist_core::calendar;
use cotahist_runner::{FeedConfig, Pipeline, Query, QueryResult};
use obs::LogFormat;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "cotahist",
    about = "B3 daily trade history with adjusted closes"
)]
struct Cli {
    /// Path to a TOML feed config. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the worker pool size.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Log filter (overridden by COTAHIST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch quotes for instruments over a date range and write CSV.
    Fetch {
        /// Exchange trading codes (e.g., PETR4 VALE3).
        #[arg(required = true)]
        instruments: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to the start date.
        #[arg(long)]
        end: Option<String>,

        /// Skip the secondary adjusted-close source.
        #[arg(long, default_value_t = false)]
        no_adjusted: bool,

        /// Write CSV here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit with status 2 if any day failed to download.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Trading calendar queries.
    Calendar {
        #[command(subcommand)]
        action: CalendarAction,
    },
}

#[derive(Subcommand)]
enum CalendarAction {
    /// List the exchange holidays of a year.
    Holidays {
        year: i32,
    },
    /// List the business days between two dates (inclusive).
    Days {
        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Fetch {
            instruments,
            start,
            end,
            no_adjusted,
            output,
            strict,
        } => {
            let config = load_config(cli.config.as_deref(), cli.workers)?;
            let query = build_query(instruments, &start, end.as_deref(), no_adjusted)?;
            let result = run_fetch(&config, &query, output.as_deref())?;
            if strict && !result.is_complete() {
                std::process::exit(2);
            }
            Ok(())
        }
        Commands::Calendar { action } => match action {
            CalendarAction::Holidays { year } => run_holidays(year),
            CalendarAction::Days { start, end } => run_days(&start, &end),
        },
    }
}

fn parse_date(value: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("{flag} must be YYYY-MM-DD, got {value:?}"))
}

fn load_config(path: Option<&Path>, workers: Option<usize>) -> Result<FeedConfig> {
    let mut config = match path {
        Some(path) => FeedConfig::from_file(path)?,
        None => FeedConfig::default(),
    };
    if let Some(workers) = workers {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        config.pool.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

fn build_query(
    instruments: Vec<String>,
    start: &str,
    end: Option<&str>,
    no_adjusted: bool,
) -> Result<Query> {
    let start = parse_date(start, "--start")?;
    let end = end.map(|e| parse_date(e, "--end")).transpose()?.unwrap_or(start);
    if start > end {
        bail!("--start {start} is after --end {end}");
    }
    let query = Query::new(instruments, start, end);
    Ok(if no_adjusted {
        query.without_adjusted()
    } else {
        query
    })
}

fn run_fetch(config: &FeedConfig, query: &Query, out_path: Option<&Path>) -> Result<QueryResult> {
    let pipeline = Pipeline::new(config)?;
    let result = pipeline.run(query)?;

    match out_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            output::write_csv(BufWriter::new(file), &result)?;
        }
        None => output::write_csv(std::io::stdout().lock(), &result)?,
    }

    report_gaps(&result);
    Ok(result)
}

/// Partial failures go to stderr; the CSV is still complete for what was
/// fetched.
fn report_gaps(result: &QueryResult) {
    for (date, reason) in &result.failed_days {
        eprintln!("warning: {date} failed: {reason}");
    }
    if !result.unpublished_days.is_empty() {
        let days: Vec<String> = result.unpublished_days.iter().map(|d| d.to_string()).collect();
        eprintln!("note: no file published for {}", days.join(", "));
    }
    if !result.dropped_lines.is_empty() {
        eprintln!(
            "warning: {} malformed line(s) dropped",
            result.dropped_lines.count
        );
        for sample in &result.dropped_lines.samples {
            eprintln!(
                "  line {} ({}): {}",
                sample.line_number, sample.instrument, sample.reason
            );
        }
    }
    for unmatched in &result.unmatched {
        eprintln!(
            "warning: no adjusted closes for {} ({}): {}",
            unmatched.instrument, unmatched.symbol, unmatched.reason
        );
    }
    eprintln!(
        "{} row(s) over {} business day(s)",
        result.rows.len(),
        result.days_requested
    );
}

fn run_holidays(year: i32) -> Result<()> {
    if !(1583..=9999).contains(&year) {
        bail!("year must be between 1583 and 9999");
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for holiday in calendar::holidays_for_year(year) {
        writeln!(out, "{} {}", holiday, holiday.format("%a"))?;
    }
    Ok(())
}

fn run_days(start: &str, end: &str) -> Result<()> {
    let start = parse_date(start, "--start")?;
    let end = parse_date(end, "--end")?;
    if start > end {
        bail!("--start {start} is after --end {end}");
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut count = 0usize;
    for day in calendar::business_days(start, end) {
        writeln!(out, "{day}")?;
        count += 1;
    }
    eprintln!("{count} business day(s)");
    Ok(())
}
