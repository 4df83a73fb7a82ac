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

//! Record header recognition.
//!
//! A header line is the first physical line of a log record. Anything that
//! does not match a header pattern is a continuation of an earlier record,
//! so a failed match is the normal case for stack traces and wrapped fields.

use super::LogDialect;
use fancy_regex::{Captures, Regex};
use std::sync::LazyLock;

// 2024-01-01 10:00:00,000 INFO  [org.jboss.as] (default task-1) message
static SERVER_LOG_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3})\s+(?P<level>[A-Z]+)\s+\[(?P<source>[^\]]+)\]\s+\((?P<thread>[^)]+)\) (?P<message>.*)$",
    )
    .expect("valid regex literal")
});

// 2024-01-01 10:00:00 -0500 INFO: [Scheduler] [JOB] SCH-00012: message
static ASPEN_LOG_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<timestamp>\d+-\d+-\d+ \d+:\d+:\d+ .\d+)\s(?P<level>[a-zA-Z0-9]+):\s+\[(?P<source>[^\]]+)\]\s+\[(?P<logtype>[^\]]+)\]\s(?P<message>.*)$",
    )
    .expect("valid regex literal")
});

static MESSAGE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>[A-Z]{3}-\d{5}):\s*(?P<message>.*)$").expect("valid regex literal")
});

/// Named fields captured from a header line. Fields a dialect does not
/// carry are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub timestamp: String,
    pub level: String,
    pub source: String,
    /// Thread name (server log only)
    pub thread: String,
    /// Log type bracket (aspen log only)
    pub log_type: String,
    /// `ABC-12345` message id split off the message (aspen log only)
    pub message_id: String,
    pub message: String,
}

fn group(caps: &Captures<'_>, name: &str) -> String {
    caps.name(name)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Match `line` against the header pattern of `dialect`.
#[must_use]
pub fn match_header(dialect: LogDialect, line: &str) -> Option<HeaderFields> {
    match dialect {
        LogDialect::ServerLog => match_server_log(line),
        LogDialect::AspenLog => match_aspen_log(line),
    }
}

/// Try every known header pattern in priority order (server log first) and
/// return the first dialect that matches.
#[must_use]
pub fn match_any(line: &str) -> Option<(LogDialect, HeaderFields)> {
    [LogDialect::ServerLog, LogDialect::AspenLog]
        .into_iter()
        .find_map(|dialect| match_header(dialect, line).map(|fields| (dialect, fields)))
}

fn match_server_log(line: &str) -> Option<HeaderFields> {
    let caps = SERVER_LOG_HEADER.captures(line).ok().flatten()?;
    Some(HeaderFields {
        timestamp: group(&caps, "timestamp"),
        level: group(&caps, "level"),
        source: group(&caps, "source"),
        thread: group(&caps, "thread"),
        message: group(&caps, "message"),
        ..HeaderFields::default()
    })
}

fn match_aspen_log(line: &str) -> Option<HeaderFields> {
    let caps = ASPEN_LOG_HEADER.captures(line).ok().flatten()?;
    let remainder = group(&caps, "message");
    let (message_id, message) = split_message_id(&remainder);
    Some(HeaderFields {
        timestamp: group(&caps, "timestamp"),
        level: group(&caps, "level"),
        source: group(&caps, "source"),
        log_type: group(&caps, "logtype"),
        message_id,
        message,
        ..HeaderFields::default()
    })
}

/// Split an optional leading `ABC-12345: ` id off a message.
fn split_message_id(remainder: &str) -> (String, String) {
    match MESSAGE_ID.captures(remainder).ok().flatten() {
        Some(caps) => (group(&caps, "id"), group(&caps, "message")),
        None => (String::new(), remainder.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_log_header() {
        let fields = match_header(
            LogDialect::ServerLog,
            "2024-01-01 10:00:00,000 INFO [Foo] (thread-1) Hello",
        )
        .expect("should match server log header");
        assert_eq!(fields.timestamp, "2024-01-01 10:00:00,000");
        assert_eq!(fields.level, "INFO");
        assert_eq!(fields.source, "Foo");
        assert_eq!(fields.thread, "thread-1");
        assert_eq!(fields.message, "Hello");
        assert!(fields.log_type.is_empty());
    }

    #[test]
    fn test_server_log_thread_with_spaces() {
        let fields = match_header(
            LogDialect::ServerLog,
            "2024-03-05 08:15:42,117 ERROR [org.jboss.as.ejb3] (EJB default - 7) \tat com.example.Bar.run(Bar.java:42)",
        )
        .expect("should match server log header");
        assert_eq!(fields.thread, "EJB default - 7");
        assert_eq!(fields.message, "\tat com.example.Bar.run(Bar.java:42)");
    }

    #[test]
    fn test_server_log_rejects_continuation() {
        assert!(match_header(LogDialect::ServerLog, "\tat java.lang.Thread.run").is_none());
        assert!(match_header(LogDialect::ServerLog, "Caused by: boom").is_none());
        assert!(match_header(LogDialect::ServerLog, "").is_none());
    }

    #[test]
    fn test_aspen_log_with_message_id() {
        let fields = match_header(
            LogDialect::AspenLog,
            "2024-01-01 10:00:00 -0500 INFO: [Scheduler] [JOB] SCH-00012: job queued",
        )
        .expect("should match aspen log header");
        assert_eq!(fields.timestamp, "2024-01-01 10:00:00 -0500");
        assert_eq!(fields.level, "INFO");
        assert_eq!(fields.source, "Scheduler");
        assert_eq!(fields.log_type, "JOB");
        assert_eq!(fields.message_id, "SCH-00012");
        assert_eq!(fields.message, "job queued");
        assert!(fields.thread.is_empty());
    }

    #[test]
    fn test_aspen_log_without_message_id() {
        let fields = match_header(
            LogDialect::AspenLog,
            "2024-01-01 10:00:00 +0000 SEVERE: [Tools] [TOOL] TOOL START: {}",
        )
        .expect("should match aspen log header");
        assert!(fields.message_id.is_empty());
        assert_eq!(fields.message, "TOOL START: {}");
    }

    #[test]
    fn test_dialects_do_not_cross_match() {
        let server = "2024-01-01 10:00:00,000 INFO [Foo] (thread-1) Hello";
        let aspen = "2024-01-01 10:00:00 -0500 INFO: [Scheduler] [JOB] hi";
        assert!(match_header(LogDialect::AspenLog, server).is_none());
        assert!(match_header(LogDialect::ServerLog, aspen).is_none());
    }

    #[test]
    fn test_match_any_priority() {
        let (dialect, _) = match_any("2024-01-01 10:00:00,000 INFO [Foo] (thread-1) Hello")
            .expect("should match");
        assert_eq!(dialect, LogDialect::ServerLog);
        let (dialect, _) = match_any("2024-01-01 10:00:00 -0500 INFO: [A] [B] hi")
            .expect("should match");
        assert_eq!(dialect, LogDialect::AspenLog);
        assert!(match_any("plain text").is_none());
    }
}
