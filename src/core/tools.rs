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

//! Tool invocation markers and the concurrent-job annotation.
//!
//! The tool runner logs `TOOL START: {json}` and `TOOL FINISH: {json}`.
//! Walking the records in order with a running balance of starts minus
//! finishes gives, for every record, the number of tool invocations in
//! flight when it was logged.

use crate::parser::record::LogRecord;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

const START_PREFIX: &str = "TOOL START:";
const FINISH_PREFIX: &str = "TOOL FINISH:";

/// A tool marker that cannot be decoded. `source_file` is the record's
/// position in a multi-file load, `sequence_index` its line in that file.
#[derive(Debug, thiserror::Error)]
pub enum ToolSpanError {
    #[error("file {source_file}, record {sequence_index}: tool marker has no payload")]
    MissingPayload {
        source_file: usize,
        sequence_index: usize,
    },
    #[error("file {source_file}, record {sequence_index}: malformed tool payload: {source}")]
    Payload {
        source_file: usize,
        sequence_index: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToolPhase {
    Start,
    Finish,
}

impl ToolPhase {
    /// Change applied to the running job counter
    #[must_use]
    pub const fn delta(self) -> i64 {
        match self {
            Self::Start => 1,
            Self::Finish => -1,
        }
    }
}

/// Where the tool was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolLocation {
    #[serde(alias = "local-deliberate", alias = "localDeliberate")]
    LocalDeliberate,
    #[serde(alias = "local-unserializable", alias = "localUnserializable")]
    LocalUnserializable,
    #[serde(alias = "remote")]
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolPayload {
    #[serde(deserialize_with = "id_string")]
    deployment_id: String,
    #[serde(deserialize_with = "id_string")]
    tool_id: String,
    tool_name: String,
    location: ToolLocation,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    parameters: Map<String, Value>,
}

/// Ids are logged as strings by some runners and as numbers by others.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, found {other}"
        ))),
    }
}

/// One decoded START or FINISH marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpan {
    /// Position of the marker record in the tracked slice
    pub record_position: usize,
    pub sequence_index: usize,
    pub phase: ToolPhase,
    pub deployment_id: String,
    pub tool_id: String,
    pub tool_name: String,
    pub location: ToolLocation,
    pub duration: Option<f64>,
    pub parameters: Map<String, Value>,
    /// Counter value after applying this marker
    pub concurrent_jobs: i64,
}

/// Phase of a tool marker message, `None` for ordinary messages
#[must_use]
pub fn marker_phase(message: &str) -> Option<ToolPhase> {
    if message.starts_with(START_PREFIX) {
        Some(ToolPhase::Start)
    } else if message.starts_with(FINISH_PREFIX) {
        Some(ToolPhase::Finish)
    } else {
        None
    }
}

fn decode(
    record: &LogRecord,
    record_position: usize,
    phase: ToolPhase,
) -> Result<ToolSpan, ToolSpanError> {
    let sequence_index = record.sequence_index;
    let source_file = record.source_file;
    let (_, json) = record
        .primary_message
        .split_once(": ")
        .ok_or(ToolSpanError::MissingPayload {
            source_file,
            sequence_index,
        })?;
    let payload: ToolPayload =
        serde_json::from_str(json).map_err(|source| ToolSpanError::Payload {
            source_file,
            sequence_index,
            source,
        })?;

    Ok(ToolSpan {
        record_position,
        sequence_index,
        phase,
        deployment_id: payload.deployment_id,
        tool_id: payload.tool_id,
        tool_name: payload.tool_name,
        location: payload.location,
        duration: payload.duration,
        parameters: payload.parameters,
        concurrent_jobs: 0,
    })
}

fn decode_all(records: &[LogRecord]) -> Result<Vec<ToolSpan>, ToolSpanError> {
    records
        .iter()
        .enumerate()
        .filter_map(|(pos, record)| {
            marker_phase(&record.primary_message).map(|phase| decode(record, pos, phase))
        })
        .collect()
}

/// Decode the tool markers of one file without stamping anything. Returns
/// the number of markers found.
pub fn check_tool_markers(records: &[LogRecord]) -> Result<usize, ToolSpanError> {
    decode_all(records).map(|spans| spans.len())
}

/// Decode every tool marker and stamp each record with the number of tool
/// invocations in flight. A marker adjusts the counter before its own record
/// is stamped. Starts and finishes are not paired, so an unmatched finish
/// can drive the counter negative.
///
/// All markers are decoded before any record is stamped: a malformed
/// payload fails the whole pass and leaves the records untouched.
pub fn track_tool_spans(records: &mut [LogRecord]) -> Result<Vec<ToolSpan>, ToolSpanError> {
    profiling::scope!("track_tool_spans");
    let mut spans = decode_all(records)?;

    let mut running: i64 = 0;
    let mut next_span = spans.iter_mut().peekable();
    for (pos, record) in records.iter_mut().enumerate() {
        if let Some(span) = next_span.next_if(|span| span.record_position == pos) {
            running += span.phase.delta();
            span.concurrent_jobs = running;
        }
        record.concurrent_job_count = running;
    }

    tracing::debug!(
        spans = spans.len(),
        final_balance = running,
        "Tracked tool spans"
    );
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reconstruct::reconstruct;
    use crate::parser::LogDialect;

    const PAYLOAD: &str = r#"{"deploymentId":"d1","toolId":7,"toolName":"GradeSync","location":"REMOTE","duration":12.5,"parameters":{"school":"north"}}"#;

    fn line(ts: u32, message: &str) -> String {
        format!("2024-01-01 10:00:{ts:02},000 INFO [Tools] (pool-1) {message}")
    }

    fn records(lines: &[String]) -> Vec<LogRecord> {
        reconstruct(LogDialect::ServerLog, lines.iter().map(String::as_str)).records
    }

    fn counts(records: &[LogRecord]) -> Vec<i64> {
        records.iter().map(|r| r.concurrent_job_count).collect()
    }

    #[test]
    fn test_start_then_finish() {
        let mut records = records(&[
            line(0, &format!("TOOL START: {PAYLOAD}")),
            line(1, &format!("TOOL FINISH: {PAYLOAD}")),
        ]);
        let spans = track_tool_spans(&mut records).expect("valid markers");
        assert_eq!(counts(&records), vec![1, 0]);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].phase, ToolPhase::Start);
        assert_eq!(spans[0].tool_id, "7");
        assert_eq!(spans[0].tool_name, "GradeSync");
        assert_eq!(spans[0].location, ToolLocation::Remote);
        assert_eq!(spans[0].duration, Some(12.5));
        assert_eq!(
            spans[0].parameters.get("school"),
            Some(&Value::String("north".to_string()))
        );
        assert_eq!(spans[1].phase, ToolPhase::Finish);
        assert_eq!(spans[1].concurrent_jobs, 0);
    }

    #[test]
    fn test_starts_without_finish_accumulate() {
        let mut records = records(&[
            line(0, "idle"),
            line(1, &format!("TOOL START: {PAYLOAD}")),
            line(2, "working"),
            line(3, &format!("TOOL START: {PAYLOAD}")),
            line(4, &format!("TOOL START: {PAYLOAD}")),
            line(5, "busy"),
        ]);
        track_tool_spans(&mut records).expect("valid markers");
        assert_eq!(counts(&records), vec![0, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn test_balanced_pair_raises_enclosed_records() {
        let mut records = records(&[
            line(0, "before"),
            line(1, &format!("TOOL START: {PAYLOAD}")),
            line(2, "inside one"),
            line(3, "inside two"),
            line(4, &format!("TOOL FINISH: {PAYLOAD}")),
            line(5, "after"),
        ]);
        track_tool_spans(&mut records).expect("valid markers");
        let counts = counts(&records);
        assert_eq!(counts[2], counts[0] + 1);
        assert_eq!(counts[3], counts[5] + 1);
        assert_eq!(counts, vec![0, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_unmatched_finish_goes_negative() {
        let mut records = records(&[
            line(0, &format!("TOOL FINISH: {PAYLOAD}")),
            line(1, "after"),
        ]);
        track_tool_spans(&mut records).expect("valid markers");
        assert_eq!(counts(&records), vec![-1, -1]);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let mut records = records(&[
            line(0, "before"),
            line(1, &format!("TOOL START: {PAYLOAD}")),
            line(2, "TOOL FINISH: {not json"),
        ]);
        let err = track_tool_spans(&mut records).expect_err("malformed payload");
        assert!(matches!(
            err,
            ToolSpanError::Payload {
                sequence_index: 3,
                ..
            }
        ));
        assert_eq!(counts(&records), vec![0, 0, 0]);
    }

    #[test]
    fn test_marker_without_payload() {
        let mut records = records(&[line(0, "TOOL START:")]);
        let err = track_tool_spans(&mut records).expect_err("missing payload");
        assert!(matches!(
            err,
            ToolSpanError::MissingPayload {
                sequence_index: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_check_markers_reports_file() {
        let mut good = records(&[
            line(0, &format!("TOOL START: {PAYLOAD}")),
            line(1, "between"),
            line(2, &format!("TOOL FINISH: {PAYLOAD}")),
        ]);
        assert_eq!(check_tool_markers(&good).expect("valid markers"), 2);
        // Checking stamps nothing
        assert_eq!(counts(&good), vec![0, 0, 0]);

        for record in &mut good {
            record.source_file = 4;
        }
        good[2].primary_message = "TOOL FINISH: {broken".to_string();
        let err = check_tool_markers(&good).expect_err("malformed payload");
        assert!(matches!(
            err,
            ToolSpanError::Payload {
                source_file: 4,
                sequence_index: 3,
                ..
            }
        ));
        assert!(err.to_string().starts_with("file 4, record 3:"));
    }

    #[test]
    fn test_location_aliases() {
        let local: ToolLocation =
            serde_json::from_str(r#""local-deliberate""#).expect("kebab alias");
        assert_eq!(local, ToolLocation::LocalDeliberate);
        let local: ToolLocation =
            serde_json::from_str(r#""LOCAL_UNSERIALIZABLE""#).expect("canonical name");
        assert_eq!(local, ToolLocation::LocalUnserializable);
    }

    #[test]
    fn test_marker_phase() {
        assert_eq!(marker_phase("TOOL START: {}"), Some(ToolPhase::Start));
        assert_eq!(marker_phase("TOOL FINISH: {}"), Some(ToolPhase::Finish));
        assert_eq!(marker_phase("about to TOOL START: {}"), None);
    }
}
