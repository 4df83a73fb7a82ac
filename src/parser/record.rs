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

use super::access::AccessDetails;
use super::header::HeaderFields;
use super::{normalize_exception_text, LogDialect};
use chrono::{DateTime, NaiveDateTime};

/// Marker that turns a message into an exception record
const EXCEPTION_MARKER: &str = "Exception";

/// Continuation lines containing this are part of the exception's cause chain
const CAUSED_BY_MARKER: &str = "Caused by";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Unknown,
}

impl LogLevel {
    /// Map both log4j/JBoss and java.util.logging level names.
    #[must_use]
    pub fn from_label(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "TRACE" | "FINEST" | "FINER" => Self::Trace,
            "DEBUG" | "FINE" | "CONFIG" => Self::Debug,
            "INFO" => Self::Info,
            "WARN" | "WARNING" => Self::Warning,
            "ERROR" | "SEVERE" => Self::Error,
            "FATAL" => Self::Fatal,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Trace => 0,
            Self::Debug => 1,
            Self::Info => 2,
            Self::Warning => 3,
            Self::Error => 4,
            Self::Fatal => 5,
            Self::Unknown => 0,
        }
    }
}

/// Semantic kind of a record, decided once from the header line's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Plain,
    /// Access-log body without a response code yet
    Request(AccessDetails),
    /// Access-log body with a response code
    Response(AccessDetails),
    Exception,
}

impl RecordKind {
    /// Classify a header message. Exception detection wins over access-log
    /// parsing, so an exception message is never read as a request.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        if message.contains(EXCEPTION_MARKER) {
            return Self::Exception;
        }
        match AccessDetails::parse(message) {
            Some(details) if details.is_in_flight() => Self::Request(details),
            Some(details) => Self::Response(details),
            None => Self::Plain,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::Exception => "exception",
        }
    }

    /// Access-log fields of a request or response
    #[must_use]
    pub const fn access(&self) -> Option<&AccessDetails> {
        match self {
            Self::Request(details) | Self::Response(details) => Some(details),
            Self::Plain | Self::Exception => None,
        }
    }

    #[must_use]
    pub const fn is_exception(&self) -> bool {
        matches!(self, Self::Exception)
    }
}

/// One logical log record: a header line plus its continuation lines.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// 1-based line number of the header line
    pub sequence_index: usize,
    /// Position of the originating file in a multi-file load
    pub source_file: usize,
    pub dialect: LogDialect,
    pub timestamp: String,
    pub level: String,
    pub source_component: String,
    pub thread_id: String,
    pub log_type: String,
    pub message_id: String,
    pub primary_message: String,
    /// Raw lines attached after the header, in arrival order
    pub continuation_lines: Vec<String>,
    pub kind: RecordKind,
    /// Tool invocations in flight when this record was logged
    pub concurrent_job_count: i64,
}

impl LogRecord {
    /// Build a record from a matched header and classify its message.
    #[must_use]
    pub fn from_header(dialect: LogDialect, fields: HeaderFields, sequence_index: usize) -> Self {
        let kind = RecordKind::classify(&fields.message);
        Self {
            sequence_index,
            source_file: 0,
            dialect,
            timestamp: fields.timestamp,
            level: fields.level,
            source_component: fields.source,
            thread_id: fields.thread,
            log_type: fields.log_type,
            message_id: fields.message_id,
            primary_message: fields.message,
            continuation_lines: Vec::new(),
            kind,
            concurrent_job_count: 0,
        }
    }

    /// Append a continuation line. Never changes `kind`.
    pub fn add_line(&mut self, line: String) {
        self.continuation_lines.push(line);
    }

    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_label(&self.level)
    }

    /// Continuation lines that belong to the exception's cause chain
    pub fn caused_by(&self) -> impl Iterator<Item = &str> {
        self.continuation_lines
            .iter()
            .map(String::as_str)
            .filter(|line| line.contains(CAUSED_BY_MARKER))
    }

    /// Exception message plus its cause chain, with GUIDs replaced.
    /// `None` for records that are not exceptions.
    #[must_use]
    pub fn normalized_exception_text(&self) -> Option<String> {
        if !self.kind.is_exception() {
            return None;
        }
        let mut text = self.primary_message.clone();
        for cause in self.caused_by() {
            text.push_str("\n\t");
            text.push_str(cause.trim_start());
        }
        Some(normalize_exception_text(&text))
    }

    /// Header timestamp parsed according to the record's dialect. Aspen log
    /// timestamps carry an offset and are converted to UTC.
    #[must_use]
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        match self.dialect {
            LogDialect::ServerLog => {
                NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%d %H:%M:%S,%3f").ok()
            }
            LogDialect::AspenLog => DateTime::parse_from_str(&self.timestamp, "%Y-%m-%d %H:%M:%S %z")
                .ok()
                .map(|dt| dt.naive_utc()),
        }
    }

    /// Header line followed by continuation lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_message.as_str())
            .chain(self.continuation_lines.iter().map(String::as_str))
    }
}
