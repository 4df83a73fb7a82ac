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

//! Performance-monitor log export: list counters or write one counter's
//! samples as CSV.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wildcrab::core::loader::read_lines;
use wildcrab::core::perfmon::{counter_names, parse_perfmon, write_csv};

#[derive(Parser, Debug)]
#[command(name = "wildcrab-perfmon")]
#[command(version)]
#[command(about = "Extract performance-monitor counters from a perfmon log", long_about = None)]
struct Args {
    /// Perfmon log file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// List counter names
    #[arg(short, long)]
    list: bool,

    /// Counter name to export as CSV
    #[arg(long, value_name = "COUNTER")]
    csv: Option<String>,

    /// Output file for the CSV (defaults to stdout)
    #[arg(long, value_name = "PATH", requires = "csv")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let lines = read_lines(&args.file)?;
    let samples = parse_perfmon(lines.iter().map(String::as_str))
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    if args.list {
        for name in counter_names(&samples) {
            println!("{name}");
        }
    }

    if let Some(counter) = args.csv.as_deref() {
        let mut out: Box<dyn Write> = match &args.output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
            )),
            None => Box::new(std::io::stdout().lock()),
        };
        let rows = write_csv(&samples, counter, &mut out)?;
        out.flush()?;
        if rows == 0 {
            tracing::warn!("No samples for counter {counter:?}");
        }
    }
    Ok(())
}
