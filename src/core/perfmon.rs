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

//! Performance-monitor text appender output.
//!
//! The monitor logs a header line followed by a block like:
//!
//! ```text
//! ********************************************************************************
//! WebRequest
//! 10:00:00:000 -> 10:01:00:000
//!  Max Active Threads. 12
//!  Throughput......... 3.50 per minute
//! Lifetime (2024-01-01 09:00:00):
//!  Max Active Threads. 40
//! ********************************************************************************
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use fancy_regex::Regex;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::LazyLock;

const BLOCK_DELIMITER: &str =
    "********************************************************************************";

static PERFMON_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{4}-\d{2}-\d{2}) (?P<time>\d{2}:\d{2}:\d{2},\d+) *\w+\s+\[org\.perfmon4j\.TextAppender\] \(PerfMon\.utilityTimer\)",
    )
    .expect("valid regex literal")
});

static SAMPLE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<start>\d{2}:\d{2}:\d{2}):\d{3} -> (?P<end>\d{2}:\d{2}:\d{2}):\d{3}")
        .expect("valid regex literal")
});

// Greedy name: the last ". " on the line separates name from value
static COUNTER_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ (?P<name>.+)\. (?P<value>[0-9.-]*)(?P<extra>.*)$").expect("valid regex literal")
});

#[derive(Debug, thiserror::Error)]
pub enum PerfmonError {
    #[error("line {line_number}: expected sample range, found {line:?}")]
    MissingSampleRange { line_number: usize, line: String },
    #[error("line {line_number}: invalid timestamp {value:?}")]
    InvalidTimestamp { line_number: usize, value: String },
}

/// One counter value and the text logged after it (units, rates)
#[derive(Debug, Clone, PartialEq)]
pub struct CounterValue {
    pub value: Option<f64>,
    pub extra: String,
}

/// One sample block
#[derive(Debug, Clone, PartialEq)]
pub struct PerfmonSample {
    /// 1-based line number of the header line
    pub line_number: usize,
    pub logged_at: NaiveDateTime,
    pub counter_name: String,
    pub sample_start: NaiveDateTime,
    pub sample_end: NaiveDateTime,
    /// Interval values in logged order
    pub values: IndexMap<String, CounterValue>,
    /// Values after the `Lifetime` marker
    pub lifetime_values: IndexMap<String, CounterValue>,
}

/// Parser state for the block currently being read
struct PendingSample {
    line_number: usize,
    date: NaiveDate,
    logged_at: NaiveDateTime,
    counter_name: Option<String>,
    range: Option<(NaiveDateTime, NaiveDateTime)>,
    in_lifetime: bool,
    values: IndexMap<String, CounterValue>,
    lifetime_values: IndexMap<String, CounterValue>,
}

impl PendingSample {
    fn start(line_number: usize, line: &str) -> Result<Option<Self>, PerfmonError> {
        let Some(caps) = PERFMON_HEADER.captures(line).ok().flatten() else {
            return Ok(None);
        };
        let date_str = caps.name("date").map_or("", |m| m.as_str());
        let time_str = caps.name("time").map_or("", |m| m.as_str());
        let invalid = || PerfmonError::InvalidTimestamp {
            line_number,
            value: format!("{date_str} {time_str}"),
        };
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| invalid())?;
        let time = NaiveTime::parse_from_str(&time_str.replace(',', "."), "%H:%M:%S%.f")
            .map_err(|_| invalid())?;

        Ok(Some(Self {
            line_number,
            date,
            logged_at: date.and_time(time),
            counter_name: None,
            range: None,
            in_lifetime: false,
            values: IndexMap::new(),
            lifetime_values: IndexMap::new(),
        }))
    }

    /// Feed one block line. Returns true once the closing delimiter is seen.
    fn process(&mut self, line_number: usize, line: &str) -> Result<bool, PerfmonError> {
        if line == BLOCK_DELIMITER {
            // Opening and closing delimiters look the same
            return Ok(!self.values.is_empty() || !self.lifetime_values.is_empty());
        }
        if self.counter_name.is_none() {
            self.counter_name = Some(line.to_string());
            return Ok(false);
        }
        if self.range.is_none() {
            self.range = Some(self.parse_range(line_number, line)?);
            return Ok(false);
        }
        if line.starts_with("Lifetime") {
            self.in_lifetime = true;
            return Ok(false);
        }

        if let Some(caps) = COUNTER_VALUE.captures(line).ok().flatten() {
            let name = caps
                .name("name")
                .map_or("", |m| m.as_str())
                .trim_end_matches('.')
                .to_string();
            let raw_value = caps.name("value").map_or("", |m| m.as_str());
            let value = CounterValue {
                value: raw_value.parse().ok(),
                extra: caps
                    .name("extra")
                    .map_or(String::new(), |m| m.as_str().to_string()),
            };
            if self.in_lifetime {
                self.lifetime_values.insert(name, value);
            } else {
                self.values.insert(name, value);
            }
        } else {
            tracing::debug!(line_number, "Skipping unrecognized perfmon line: {line}");
        }
        Ok(false)
    }

    fn parse_range(
        &self,
        line_number: usize,
        line: &str,
    ) -> Result<(NaiveDateTime, NaiveDateTime), PerfmonError> {
        let missing = || PerfmonError::MissingSampleRange {
            line_number,
            line: line.to_string(),
        };
        let caps = SAMPLE_RANGE.captures(line).ok().flatten().ok_or_else(missing)?;
        let at = |group: &str| {
            caps.name(group)
                .and_then(|m| NaiveTime::parse_from_str(m.as_str(), "%H:%M:%S").ok())
                .map(|time| self.date.and_time(time))
                .ok_or_else(missing)
        };
        Ok((at("start")?, at("end")?))
    }

    fn finish(self) -> PerfmonSample {
        let (sample_start, sample_end) = self.range.unwrap_or((self.logged_at, self.logged_at));
        PerfmonSample {
            line_number: self.line_number,
            logged_at: self.logged_at,
            counter_name: self.counter_name.unwrap_or_default(),
            sample_start,
            sample_end,
            values: self.values,
            lifetime_values: self.lifetime_values,
        }
    }
}

/// Parse all sample blocks. A block without a sample range aborts the file.
pub fn parse_perfmon<'a, I>(lines: I) -> Result<Vec<PerfmonSample>, PerfmonError>
where
    I: IntoIterator<Item = &'a str>,
{
    profiling::scope!("parse_perfmon");
    let mut samples = Vec::new();
    let mut pending: Option<PendingSample> = None;

    for (idx, line) in lines.into_iter().enumerate() {
        let line_number = idx + 1;
        if let Some(sample) = pending.as_mut() {
            if sample.process(line_number, line)? {
                if let Some(done) = pending.take() {
                    samples.push(done.finish());
                }
            }
        } else {
            pending = PendingSample::start(line_number, line)?;
        }
    }

    if let Some(sample) = pending {
        tracing::warn!(
            line_number = sample.line_number,
            "Perfmon block was not closed before end of file, discarding it"
        );
    }
    tracing::debug!(samples = samples.len(), "Parsed perfmon samples");
    Ok(samples)
}

/// Distinct counter names, sorted
#[must_use]
pub fn counter_names(samples: &[PerfmonSample]) -> Vec<&str> {
    samples
        .iter()
        .map(|s| s.counter_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write the samples of one counter as CSV. Columns are the fixed sample
/// columns followed by `NAME` and `NAME_extra` for every value name in
/// first-seen order. Returns the number of rows written.
pub fn write_csv<W: Write>(
    samples: &[PerfmonSample],
    counter_name: &str,
    out: &mut W,
) -> std::io::Result<usize> {
    let selected: Vec<&PerfmonSample> = samples
        .iter()
        .filter(|s| s.counter_name == counter_name)
        .collect();
    if selected.is_empty() {
        return Ok(0);
    }

    let names: IndexSet<&str> = selected
        .iter()
        .flat_map(|s| s.values.keys().map(String::as_str))
        .collect();

    let mut header = vec![
        "counter_name".to_string(),
        "log_date".to_string(),
        "log_time".to_string(),
        "sample_start".to_string(),
        "sample_end".to_string(),
    ];
    for name in &names {
        header.push(escape_field(name));
        header.push(escape_field(&format!("{name}_extra")));
    }
    writeln!(out, "{}", header.join(","))?;

    for sample in &selected {
        let mut row = vec![
            escape_field(&sample.counter_name),
            sample.logged_at.format("%Y-%m-%d").to_string(),
            sample.logged_at.format("%H:%M:%S%.3f").to_string(),
            sample.sample_start.to_string(),
            sample.sample_end.to_string(),
        ];
        for name in &names {
            match sample.values.get(*name) {
                Some(counter) => {
                    row.push(counter.value.map_or_else(String::new, |v| v.to_string()));
                    row.push(escape_field(&counter.extra));
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                }
            }
        }
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(selected.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(header_time: &str, counter: &str, range: &str, values: &[&str]) -> Vec<String> {
        let mut lines = vec![
            format!(
                "2024-01-01 {header_time} INFO  [org.perfmon4j.TextAppender] (PerfMon.utilityTimer) "
            ),
            BLOCK_DELIMITER.to_string(),
            counter.to_string(),
            range.to_string(),
        ];
        lines.extend(values.iter().map(|v| (*v).to_string()));
        lines.push(BLOCK_DELIMITER.to_string());
        lines
    }

    #[test]
    fn test_parse_single_block() {
        let mut lines = vec!["2024-01-01 09:59:59,000 INFO  [Foo] (main) unrelated".to_string()];
        lines.extend(block(
            "10:01:00,123",
            "WebRequest",
            "10:00:00:000 -> 10:01:00:000",
            &[
                " Max Active Threads. 12",
                " Throughput......... 3.50 per minute",
                " Average Duration... ",
                "Lifetime (2024-01-01 09:00:00):",
                " Max Active Threads. 40",
            ],
        ));

        let samples = parse_perfmon(lines.iter().map(String::as_str)).expect("valid perfmon");
        assert_eq!(samples.len(), 1);
        let sample = &samples[0];
        assert_eq!(sample.line_number, 2);
        assert_eq!(sample.counter_name, "WebRequest");
        assert_eq!(sample.sample_start.to_string(), "2024-01-01 10:00:00");
        assert_eq!(sample.sample_end.to_string(), "2024-01-01 10:01:00");
        assert_eq!(sample.values["Max Active Threads"].value, Some(12.0));
        assert_eq!(sample.values["Throughput"].value, Some(3.5));
        assert_eq!(sample.values["Throughput"].extra, " per minute");
        assert_eq!(sample.values["Average Duration"].value, None);
        assert_eq!(sample.lifetime_values["Max Active Threads"].value, Some(40.0));
    }

    #[test]
    fn test_missing_sample_range_is_fatal() {
        let lines = block("10:01:00,123", "WebRequest", "not a range", &[" A. 1"]);
        let err = parse_perfmon(lines.iter().map(String::as_str)).expect_err("missing range");
        assert!(matches!(
            err,
            PerfmonError::MissingSampleRange { line_number: 4, .. }
        ));
    }

    #[test]
    fn test_sample_range_must_start_the_line() {
        let lines = block(
            "10:01:00,123",
            "WebRequest",
            "elapsed 10:00:00:000 -> 10:01:00:000",
            &[" A. 1"],
        );
        let err = parse_perfmon(lines.iter().map(String::as_str)).expect_err("unanchored range");
        assert!(matches!(
            err,
            PerfmonError::MissingSampleRange { line_number: 4, .. }
        ));
    }

    #[test]
    fn test_counter_names_and_csv() {
        let mut lines = block(
            "10:01:00,000",
            "WebRequest",
            "10:00:00:000 -> 10:01:00:000",
            &[" Hits. 5", " Note. 1 a,b"],
        );
        lines.extend(block(
            "10:01:00,000",
            "Cache",
            "10:00:00:000 -> 10:01:00:000",
            &[" Misses. 2"],
        ));
        lines.extend(block(
            "10:02:00,000",
            "WebRequest",
            "10:01:00:000 -> 10:02:00:000",
            &[" Hits. 7"],
        ));
        let samples = parse_perfmon(lines.iter().map(String::as_str)).expect("valid perfmon");
        assert_eq!(counter_names(&samples), vec!["Cache", "WebRequest"]);

        let mut out = Vec::new();
        let rows = write_csv(&samples, "WebRequest", &mut out).expect("write to vec");
        assert_eq!(rows, 2);
        let csv = String::from_utf8(out).expect("utf8");
        let csv_lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            csv_lines[0],
            "counter_name,log_date,log_time,sample_start,sample_end,Hits,Hits_extra,Note,Note_extra"
        );
        assert_eq!(
            csv_lines[1],
            "WebRequest,2024-01-01,10:01:00.000,2024-01-01 10:00:00,2024-01-01 10:01:00,5,,1,\" a,b\""
        );
        assert_eq!(
            csv_lines[2],
            "WebRequest,2024-01-01,10:02:00.000,2024-01-01 10:01:00,2024-01-01 10:02:00,7,,,"
        );
    }

    #[test]
    fn test_unknown_counter_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(write_csv(&[], "Nope", &mut out).expect("write"), 0);
        assert!(out.is_empty());
    }
}
