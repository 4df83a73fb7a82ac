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

//! Response-time reports over access-log records.

pub mod stats;

use crate::config::PathRewrite;
use crate::parser::record::{LogRecord, RecordKind};
use fancy_regex::Regex;
use std::collections::BTreeMap;

/// Key under which every timed response is collected
pub const ALL_KEY: &str = "all";

/// Compiled form of a configured path rewrite
pub struct PathRule {
    pattern: Regex,
    replacement: String,
}

impl PathRule {
    /// Compile configured rewrites, skipping invalid patterns with a warning.
    #[must_use]
    pub fn compile_all(rewrites: &[PathRewrite]) -> Vec<Self> {
        rewrites
            .iter()
            .filter_map(|rewrite| match Regex::new(&rewrite.pattern) {
                Ok(pattern) => Some(Self {
                    pattern,
                    replacement: rewrite.replacement.clone(),
                }),
                Err(e) => {
                    tracing::warn!("Ignoring invalid path rule {:?}: {e}", rewrite.pattern);
                    None
                }
            })
            .collect()
    }

    fn apply(&self, path: &str) -> String {
        self.pattern
            .replace_all(path, self.replacement.as_str())
            .into_owned()
    }
}

/// One row of the duration table
#[derive(Debug, Clone, PartialEq)]
pub struct DurationRow {
    pub key: String,
    pub percentile: f64,
    pub median: f64,
    pub count: usize,
    pub sum: u64,
}

/// Durations of completed responses grouped by de-identified path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationReport {
    groups: BTreeMap<String, Vec<u64>>,
}

impl DurationReport {
    /// Collect durations of timed responses. Requests still in flight and
    /// responses logged without a duration are skipped.
    #[must_use]
    pub fn from_records(records: &[LogRecord], rules: &[PathRule]) -> Self {
        let mut groups: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for record in records {
            let RecordKind::Response(details) = &record.kind else {
                continue;
            };
            let Some(duration) = details.duration else {
                continue;
            };
            let path = rules
                .iter()
                .fold(details.deidentified_path(), |path, rule| rule.apply(&path));
            groups.entry(ALL_KEY.to_string()).or_default().push(duration);
            groups.entry(path).or_default().push(duration);
        }
        Self { groups }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn durations(&self, key: &str) -> Option<&[u64]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Percentile over all timed responses
    #[must_use]
    pub fn overall(&self, level: f64) -> Option<f64> {
        self.durations(ALL_KEY)
            .and_then(|durations| stats::percentile(durations, level))
    }

    /// Row for one key
    #[must_use]
    pub fn row(&self, key: &str, level: f64) -> Option<DurationRow> {
        let durations = self.durations(key)?;
        Some(DurationRow {
            key: key.to_string(),
            percentile: stats::percentile(durations, level)?,
            median: stats::median(durations)?,
            count: durations.len(),
            sum: durations.iter().sum(),
        })
    }

    /// Rows sorted by key. With `split` false only the `all` row is returned.
    #[must_use]
    pub fn rows(&self, level: f64, split: bool) -> Vec<DurationRow> {
        if !split {
            return self.row(ALL_KEY, level).into_iter().collect();
        }
        self.groups
            .keys()
            .filter_map(|key| self.row(key, level))
            .collect()
    }
}
