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

//! The in-memory result of analyzing one log: records plus everything
//! derived from them. Built once; consumers only read it.

use crate::core::exceptions::{cluster_exceptions, exception_total, ExceptionCluster};
use crate::core::loader::LoadedLog;
use crate::core::tools::{track_tool_spans, ToolSpan, ToolSpanError};
use crate::parser::record::LogRecord;

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub records: Vec<LogRecord>,
    pub exceptions: Vec<ExceptionCluster>,
    pub tool_spans: Vec<ToolSpan>,
}

impl Analysis {
    /// Run the concurrency annotation pass and cluster exceptions.
    pub fn build(mut records: Vec<LogRecord>) -> Result<Self, ToolSpanError> {
        let tool_spans = track_tool_spans(&mut records)?;
        let exceptions = cluster_exceptions(&records);
        tracing::info!(
            records = records.len(),
            exception_clusters = exceptions.len(),
            tool_spans = tool_spans.len(),
            "Analysis complete"
        );
        Ok(Self {
            records,
            exceptions,
            tool_spans,
        })
    }

    pub fn from_loaded(log: LoadedLog) -> Result<Self, ToolSpanError> {
        Self::build(log.records)
    }

    #[must_use]
    pub fn exception_total(&self) -> usize {
        exception_total(&self.exceptions)
    }

    /// The record a tool span was decoded from
    #[must_use]
    pub fn span_record(&self, span: &ToolSpan) -> Option<&LogRecord> {
        self.records.get(span.record_position)
    }
}
