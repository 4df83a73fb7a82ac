// WildCrab - GPL-3.0-or-later
// This file is part of WildCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// WildCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// WildCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with WildCrab.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wildcrab::config::AnalysisConfig;
use wildcrab::core::loader::load_files;
use wildcrab::core::query;
use wildcrab::parser::record::{LogLevel, LogRecord};
use wildcrab::report::{DurationReport, PathRule};
use wildcrab::{Analysis, LogDialect};

#[cfg(feature = "ram-profiling")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("WILDCRAB_REVISION"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "wildcrab")]
#[command(author = "WildCrab Team")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Analyze application server logs: exceptions, tool concurrency and response times", long_about = None)]
struct Args {
    /// Header dialect of the input files (detected per file if omitted)
    #[arg(long, global = true, value_enum)]
    dialect: Option<LogDialect>,

    /// Log progress to stderr (`RUST_LOG` overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path for the DHAT heap profiling output (only used when built with --features ram-profiling)
    #[cfg(feature = "ram-profiling")]
    #[arg(
        long = "profile-output",
        value_name = "PROFILE_FILE",
        default_value = "dhat-heap.json",
        global = true
    )]
    profile_output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every record with its continuation lines
    Dump {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// Only show records at or above this level (e.g. WARN)
        #[arg(long)]
        level: Option<String>,
    },
    /// List the most frequent exceptions
    Exceptions {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// Number of clusters to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print the line numbers of every occurrence
        #[arg(long)]
        occurrences: bool,
    },
    /// Response-time percentiles of completed requests
    Percentiles {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// Percentile to report
        #[arg(long)]
        level: Option<f64>,
        /// Split times out by request path
        #[arg(long)]
        split: bool,
    },
    /// Tool invocations and the number of jobs running at each marker
    Tools {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// Records logged by one thread
    Thread {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        thread_id: String,
    },
    /// Requests and responses of one HTTP session
    Session {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        session_id: String,
    },
    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn analyze(files: &[PathBuf], dialect: Option<LogDialect>) -> Result<Analysis> {
    let log = load_files(files, dialect).context("Failed to load log files")?;
    if log.paths.is_empty() {
        if let Some(rejected) = log.rejected.first() {
            anyhow::bail!("{}: {}", rejected.path.display(), rejected.reason);
        }
    }
    Analysis::from_loaded(log).context("Failed to decode tool markers")
}

fn print_record(record: &LogRecord) {
    println!(
        "{:>7} {} {:<5} [{}] ({}) jobs={} {}",
        record.sequence_index,
        record.timestamp,
        record.level,
        record.source_component,
        if record.thread_id.is_empty() {
            &record.log_type
        } else {
            &record.thread_id
        },
        record.concurrent_job_count,
        record.kind.label()
    );
    if !record.message_id.is_empty() {
        println!("        id: {}", record.message_id);
    }
    if let Some(access) = record.kind.access() {
        let duration = access
            .duration
            .map_or_else(|| "-".to_string(), |d| format!("{d}ms"));
        println!(
            "        {} {} {} -> {} in {duration} (tenant {}, session {}, client {})",
            access.http_method,
            access.path,
            access.deidentified_path(),
            access.response_code,
            access.tenant,
            access.session_id,
            access.client_address
        );
    }
    for (idx, line) in record.lines().enumerate() {
        if idx == 0 {
            println!("        message: {line}");
        } else {
            println!("        | {line}");
        }
    }
}

fn dump(analysis: &Analysis, level: Option<&str>) {
    match level.map(LogLevel::from_label) {
        Some(min_level) => {
            query::records_at_level(&analysis.records, min_level).for_each(print_record);
        }
        None => analysis.records.iter().for_each(print_record),
    }
}

fn exceptions(analysis: &Analysis, limit: usize, occurrences: bool) {
    println!(
        "{} exceptions in {} clusters",
        analysis.exception_total(),
        analysis.exceptions.len()
    );
    for (rank, cluster) in analysis.exceptions.iter().take(limit).enumerate() {
        println!(
            "#{:<3} Count: {:>6} Exception: {}",
            rank + 1,
            cluster.len(),
            cluster.normalized_text
        );
        if occurrences {
            let lines: Vec<String> = cluster
                .records(&analysis.records)
                .map(|r| r.sequence_index.to_string())
                .collect();
            println!("      lines: {}", lines.join(", "));
        }
    }
}

fn percentiles(analysis: &Analysis, config: &AnalysisConfig, level: f64, split: bool) {
    let rules = PathRule::compile_all(&config.path_rules);
    let report = DurationReport::from_records(&analysis.records, &rules);
    if report.is_empty() {
        println!("No request durations in log");
        return;
    }

    let rows = report.rows(level, split);
    let width = rows.iter().map(|r| r.key.len()).max().unwrap_or(7).max(7);
    println!(
        "{:<width$} {:>10} {:>10} {:>8} {:>12}",
        "Request",
        format!("P{level}"),
        "Median",
        "Count",
        "Sum"
    );
    for row in &rows {
        println!(
            "{:<width$} {:>10.0} {:>10.0} {:>8} {:>12}",
            row.key, row.percentile, row.median, row.count, row.sum
        );
    }
}

fn tools(analysis: &Analysis) {
    if let Some(peak) = query::peak_concurrency(&analysis.records) {
        println!(
            "Peak concurrency: {} jobs at line {} ({})",
            peak.concurrent_job_count, peak.sequence_index, peak.timestamp
        );
    }
    for span in &analysis.tool_spans {
        let timestamp = analysis
            .span_record(span)
            .map_or("", |record| record.timestamp.as_str());
        let duration = span
            .duration
            .map_or_else(|| "-".to_string(), |d| format!("{d}"));
        println!(
            "{:>7} {timestamp} {:<6} {:<24} {:?} deployment={} tool={} duration={duration} jobs={}",
            span.sequence_index,
            format!("{:?}", span.phase).to_uppercase(),
            span.tool_name,
            span.location,
            span.deployment_id,
            span.tool_id,
            span.concurrent_jobs
        );
    }
}

fn show_config(init: bool) -> Result<()> {
    if init {
        let path = AnalysisConfig::default()
            .save()
            .map_err(anyhow::Error::msg)
            .context("Failed to write default config")?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let config = AnalysisConfig::load();
    match AnalysisConfig::config_path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config directory"),
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn single(file: &Path) -> Vec<PathBuf> {
    vec![file.to_path_buf()]
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    tracing::info!(
        "WildCrab starting up (version {})",
        env!("CARGO_PKG_VERSION")
    );

    #[cfg(feature = "ram-profiling")]
    let _profiler = {
        tracing::info!("RAM profiling enabled, output: {:?}", args.profile_output);
        dhat::Profiler::builder()
            .file_name(args.profile_output.clone())
            .build()
    };

    #[cfg(feature = "cpu-profiling")]
    {
        tracing::info!("CPU profiling enabled with Tracy - run Tracy profiler to connect");
    }

    let config = AnalysisConfig::load();
    let dialect = args.dialect.or(config.dialect);

    match args.command {
        Command::Dump { files, level } => dump(&analyze(&files, dialect)?, level.as_deref()),
        Command::Exceptions {
            files,
            limit,
            occurrences,
        } => exceptions(
            &analyze(&files, dialect)?,
            limit.unwrap_or(config.exception_limit),
            occurrences,
        ),
        Command::Percentiles { files, level, split } => percentiles(
            &analyze(&files, dialect)?,
            &config,
            level.unwrap_or(config.percentile),
            split,
        ),
        Command::Tools { files } => tools(&analyze(&files, dialect)?),
        Command::Thread { file, thread_id } => {
            let analysis = analyze(&single(&file), dialect)?;
            query::records_for_thread(&analysis.records, &thread_id).for_each(print_record);
        }
        Command::Session { file, session_id } => {
            let analysis = analyze(&single(&file), dialect)?;
            query::records_for_session(&analysis.records, &session_id).for_each(print_record);
        }
        Command::Config { init } => show_config(init)?,
    }
    Ok(())
}
