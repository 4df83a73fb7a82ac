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

use crate::core::reconstruct::{DroppedLine, Reconstruction, ReconstructionStats, Reconstructor};
use crate::core::tools::{check_tool_markers, ToolSpanError};
use crate::parser::record::LogRecord;
use crate::parser::{detect_dialect, LogDialect};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("abandoned {path}: {source}")]
    ToolMarker {
        path: PathBuf,
        #[source]
        source: ToolSpanError,
    },
}

/// A file left out of a multi-file load because its markers are malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Records reconstructed from one or more files
#[derive(Debug, Clone, Default)]
pub struct LoadedLog {
    pub paths: Vec<PathBuf>,
    /// Dialect of each file, in `paths` order
    pub dialects: Vec<LogDialect>,
    pub records: Vec<LogRecord>,
    pub dropped: Vec<DroppedLine>,
    pub stats: ReconstructionStats,
    /// Files whose reconstruction was abandoned
    pub rejected: Vec<RejectedFile>,
}

/// Read a text file with lossy UTF-8 conversion, one entry per line with
/// trailing whitespace removed.
pub fn read_lines(path: &Path) -> Result<Vec<String>, LoadError> {
    let read_start = Instant::now();
    let buffer = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        "File I/O took {:?} to read {} bytes from {}",
        read_start.elapsed(),
        buffer.len(),
        path.display()
    );

    // Replaces invalid UTF-8 with U+FFFD instead of failing the whole file
    let content = String::from_utf8_lossy(&buffer);
    Ok(content.lines().map(|line| line.trim_end().to_string()).collect())
}

/// Reconstruct records from already-read lines. Detects the dialect from the
/// lines themselves when none is given.
#[must_use]
pub fn reconstruct_lines(
    lines: &[String],
    dialect: Option<LogDialect>,
    source_file: usize,
) -> Reconstruction {
    let dialect = dialect.unwrap_or_else(|| detect_dialect(lines.iter().map(String::as_str)));
    let mut reconstructor = Reconstructor::new(dialect).with_source_file(source_file);
    for (idx, line) in lines.iter().enumerate() {
        reconstructor.push_line(idx + 1, line);
    }
    reconstructor.finish()
}

/// Load one file. A malformed tool marker abandons the file.
pub fn load_file(path: &Path, dialect: Option<LogDialect>) -> Result<LoadedLog, LoadError> {
    load_indexed(path, dialect, 0)
}

fn load_indexed(
    path: &Path,
    dialect: Option<LogDialect>,
    source_file: usize,
) -> Result<LoadedLog, LoadError> {
    let lines = read_lines(path)?;
    let dialect = dialect.unwrap_or_else(|| detect_dialect(lines.iter().map(String::as_str)));

    let parse_start = Instant::now();
    let reconstruction = reconstruct_lines(&lines, Some(dialect), source_file);
    tracing::info!(
        "Reconstruction took {:?} to build {} records from {} lines of {} ({dialect})",
        parse_start.elapsed(),
        reconstruction.records.len(),
        lines.len(),
        path.display()
    );
    check_tool_markers(&reconstruction.records).map_err(|source| LoadError::ToolMarker {
        path: path.to_path_buf(),
        source,
    })?;
    if !reconstruction.dropped.is_empty() {
        tracing::warn!(
            "Dropped {} lines that preceded the first record of {}",
            reconstruction.dropped.len(),
            path.display()
        );
    }

    Ok(LoadedLog {
        paths: vec![path.to_path_buf()],
        dialects: vec![dialect],
        records: reconstruction.records,
        dropped: reconstruction.dropped,
        stats: reconstruction.stats,
        rejected: Vec::new(),
    })
}

/// Load a file if one was given. No file name yields an empty log.
pub fn load_optional(
    path: Option<&Path>,
    dialect: Option<LogDialect>,
) -> Result<LoadedLog, LoadError> {
    path.map_or_else(|| Ok(LoadedLog::default()), |path| load_file(path, dialect))
}

/// Load several files in parallel and merge them into one timeline.
///
/// A file with a malformed tool marker is left out and listed in
/// `rejected`; the other files are kept. Read failures abort the load.
/// `source_file` of every record is its file's position in the merged
/// `paths`, while errors name the position in the `paths` argument.
///
/// Records are stable-sorted by parsed timestamp; records whose timestamp
/// cannot be parsed keep their relative order after all dated records.
/// `sequence_index` stays the line number within the record's own file.
pub fn load_files(paths: &[PathBuf], dialect: Option<LogDialect>) -> Result<LoadedLog, LoadError> {
    let start_time = Instant::now();
    let loaded: Vec<Result<LoadedLog, LoadError>> = paths
        .par_iter()
        .enumerate()
        .map(|(idx, path)| load_indexed(path, dialect, idx))
        .collect();

    let mut merged = LoadedLog::default();
    for result in loaded {
        let mut log = match result {
            Ok(log) => log,
            Err(LoadError::ToolMarker { path, source }) => {
                tracing::warn!("Skipping {}: {source}", path.display());
                merged.rejected.push(RejectedFile {
                    path,
                    reason: source.to_string(),
                });
                continue;
            }
            Err(err) => return Err(err),
        };
        let source_file = merged.paths.len();
        for record in &mut log.records {
            record.source_file = source_file;
        }
        merged.paths.extend(log.paths);
        merged.dialects.extend(log.dialects);
        merged.records.extend(log.records);
        merged.dropped.extend(log.dropped);
        merged.stats.lines += log.stats.lines;
        merged.stats.headers += log.stats.headers;
        merged.stats.continuations += log.stats.continuations;
        merged.stats.dropped += log.stats.dropped;
    }

    if paths.len() > 1 {
        merged
            .records
            .sort_by_cached_key(|r| r.parsed_timestamp().map_or((1, None), |ts| (0, Some(ts))));
    }

    tracing::info!(
        "Loaded {} records from {} files in {:?}",
        merged.records.len(),
        merged.paths.len(),
        start_time.elapsed()
    );
    Ok(merged)
}
