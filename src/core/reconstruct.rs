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

//! Rebuilding logical records from physical lines.
//!
//! Stack traces and wrapped fields span several physical lines. The
//! reconstructor decides for every line whether it opens a new record or
//! continues an earlier one, and under concurrent load the server log
//! interleaves the traces of different threads. Header lines whose message
//! starts with a tab are therefore routed back to the open record of their
//! thread (only the message is kept, so the header's timestamp does not leak
//! into exception cluster keys), while lines without any header go to the
//! most recent record.

use crate::parser::header::match_header;
use crate::parser::record::LogRecord;
use crate::parser::LogDialect;
use std::collections::HashMap;

/// Leading character of a thread-routed continuation message
const CONTINUATION_MARKER: char = '\t';

/// A line that arrived before any record was open and had to be dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedLine {
    pub line_number: usize,
    pub text: String,
}

/// Line accounting. `lines == headers + continuations + dropped` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructionStats {
    pub lines: usize,
    /// Lines that opened a new record
    pub headers: usize,
    /// Lines appended to an existing record, thread-routed headers included
    pub continuations: usize,
    pub dropped: usize,
}

/// Output of one reconstruction pass
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub records: Vec<LogRecord>,
    pub dropped: Vec<DroppedLine>,
    pub stats: ReconstructionStats,
}

/// Stateful single-pass record builder for one file.
pub struct Reconstructor {
    dialect: LogDialect,
    source_file: usize,
    records: Vec<LogRecord>,
    /// Thread id -> index into `records` of that thread's open record.
    /// Lives exactly as long as one file's pass.
    open_by_thread: HashMap<String, usize>,
    dropped: Vec<DroppedLine>,
    stats: ReconstructionStats,
}

impl Reconstructor {
    #[must_use]
    pub fn new(dialect: LogDialect) -> Self {
        Self {
            dialect,
            source_file: 0,
            records: Vec::new(),
            open_by_thread: HashMap::new(),
            dropped: Vec::new(),
            stats: ReconstructionStats::default(),
        }
    }

    /// Tag produced records with the position of their file in a multi-file load
    #[must_use]
    pub fn with_source_file(mut self, source_file: usize) -> Self {
        self.source_file = source_file;
        self
    }

    /// Consume the next physical line. `line_number` is 1-based.
    pub fn push_line(&mut self, line_number: usize, line: &str) {
        self.stats.lines += 1;

        if let Some(fields) = match_header(self.dialect, line) {
            if self.dialect.tracks_threads() && fields.message.starts_with(CONTINUATION_MARKER) {
                if let Some(&open) = self.open_by_thread.get(&fields.thread) {
                    self.records[open].add_line(fields.message);
                    self.stats.continuations += 1;
                    return;
                }
            }

            let mut record = LogRecord::from_header(self.dialect, fields, line_number);
            record.source_file = self.source_file;
            if self.dialect.tracks_threads() {
                self.open_by_thread
                    .insert(record.thread_id.clone(), self.records.len());
            }
            self.records.push(record);
            self.stats.headers += 1;
            return;
        }

        if let Some(last) = self.records.last_mut() {
            last.add_line(line.to_string());
            self.stats.continuations += 1;
        } else {
            tracing::warn!(
                line_number,
                "Continuation line before any log record, dropping it"
            );
            self.dropped.push(DroppedLine {
                line_number,
                text: line.to_string(),
            });
            self.stats.dropped += 1;
        }
    }

    #[must_use]
    pub fn finish(self) -> Reconstruction {
        tracing::debug!(
            records = self.records.len(),
            threads = self.open_by_thread.len(),
            dropped = self.dropped.len(),
            "Reconstruction finished"
        );
        Reconstruction {
            records: self.records,
            dropped: self.dropped,
            stats: self.stats,
        }
    }
}

/// Reconstruct records from lines in file order, numbering them from 1.
#[must_use]
pub fn reconstruct<'a, I>(dialect: LogDialect, lines: I) -> Reconstruction
where
    I: IntoIterator<Item = &'a str>,
{
    profiling::scope!("reconstruct");
    let mut reconstructor = Reconstructor::new(dialect);
    for (idx, line) in lines.into_iter().enumerate() {
        reconstructor.push_line(idx + 1, line);
    }
    reconstructor.finish()
}
