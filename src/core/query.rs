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

//! Read-only record filters used by the record listings.

use crate::parser::record::{LogLevel, LogRecord};

/// All records logged by one thread
pub fn records_for_thread<'a>(
    records: &'a [LogRecord],
    thread_id: &'a str,
) -> impl Iterator<Item = &'a LogRecord> {
    records.iter().filter(move |r| r.thread_id == thread_id)
}

/// Requests and responses of one HTTP session
pub fn records_for_session<'a>(
    records: &'a [LogRecord],
    session_id: &'a str,
) -> impl Iterator<Item = &'a LogRecord> {
    records
        .iter()
        .filter(move |r| r.kind.access().is_some_and(|a| a.session_id == session_id))
}

/// Records at or above `min_level`. Unknown levels are always kept.
pub fn records_at_level(
    records: &[LogRecord],
    min_level: LogLevel,
) -> impl Iterator<Item = &LogRecord> {
    records.iter().filter(move |r| {
        let level = r.log_level();
        level == LogLevel::Unknown || level.severity() >= min_level.severity()
    })
}

/// First record logged at the highest concurrent job count
#[must_use]
pub fn peak_concurrency(records: &[LogRecord]) -> Option<&LogRecord> {
    records
        .iter()
        .rev()
        .max_by_key(|r| r.concurrent_job_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reconstruct::reconstruct;
    use crate::parser::LogDialect;

    fn sample() -> Vec<LogRecord> {
        reconstruct(
            LogDialect::ServerLog,
            [
                "2024-01-01 10:00:00,000 DEBUG [Web] (task-1) acme\t---\t10.0.0.1\t---\tGET\t/a\ts1",
                "2024-01-01 10:00:00,010 INFO [Web] (task-1) acme\t10ms\t10.0.0.1\t200\tGET\t/a\ts1",
                "2024-01-01 10:00:00,020 INFO [Web] (task-2) acme\t20ms\t10.0.0.2\t200\tGET\t/b\ts2",
                "2024-01-01 10:00:00,030 ERROR [Ejb] (task-2) WrappedException: s1",
            ],
        )
        .records
    }

    #[test]
    fn test_thread_filter() {
        let records = sample();
        let lines: Vec<usize> = records_for_thread(&records, "task-2")
            .map(|r| r.sequence_index)
            .collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn test_session_filter_skips_non_access_records() {
        let records = sample();
        let lines: Vec<usize> = records_for_session(&records, "s1")
            .map(|r| r.sequence_index)
            .collect();
        assert_eq!(lines, vec![1, 2]);
    }

    #[test]
    fn test_level_filter() {
        let records = sample();
        assert_eq!(records_at_level(&records, LogLevel::Info).count(), 3);
        assert_eq!(records_at_level(&records, LogLevel::Error).count(), 1);
    }

    #[test]
    fn test_peak_concurrency_prefers_first() {
        let mut records = sample();
        records[1].concurrent_job_count = 2;
        records[2].concurrent_job_count = 2;
        let peak = peak_concurrency(&records).expect("non-empty");
        assert_eq!(peak.sequence_index, 2);
        assert!(peak_concurrency(&[]).is_none());
    }
}
