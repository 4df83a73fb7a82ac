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

pub mod access;
pub mod header;
pub mod record;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Placeholder substituted for generated identifiers in exception text
pub const GUID_PLACEHOLDER: &str = "<GUID>";

// 8-4-4-4-12 hex groups, e.g. 550e8400-e29b-41d4-a716-446655440000. Only
// hex digits count as a boundary, so `lock_<guid>` is still replaced.
static GUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?<![0-9a-fA-F])[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}(?![0-9a-fA-F])",
    )
    .expect("valid regex literal")
});

/// Number of non-empty lines inspected by [`detect_dialect`]
const DETECTION_SAMPLE: usize = 200;

/// Header dialect of a log file. Chosen once per file, never per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LogDialect {
    /// `TIMESTAMP LEVEL [SOURCE] (THREAD) MESSAGE`, e.g. the application server's `server.log`
    ServerLog,
    /// `TIMESTAMP LEVEL: [SOURCE] [LOGTYPE] MESSAGE`, e.g. the application's own `AspenLog`
    AspenLog,
}

impl LogDialect {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ServerLog => "server-log",
            Self::AspenLog => "aspen-log",
        }
    }

    /// Whether header lines whose message starts with a tab are routed to
    /// the open record of the same thread.
    #[must_use]
    pub const fn tracks_threads(self) -> bool {
        match self {
            Self::ServerLog => true,
            Self::AspenLog => false,
        }
    }
}

impl std::fmt::Display for LogDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the header dialect by sampling the first lines of a file.
/// Falls back to [`LogDialect::ServerLog`] when nothing matches or on a tie.
#[must_use]
pub fn detect_dialect<'a, I>(lines: I) -> LogDialect
where
    I: IntoIterator<Item = &'a str>,
{
    let mut server_matches = 0usize;
    let mut aspen_matches = 0usize;

    for line in lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .take(DETECTION_SAMPLE)
    {
        match header::match_any(line) {
            Some((LogDialect::ServerLog, _)) => server_matches += 1,
            Some((LogDialect::AspenLog, _)) => aspen_matches += 1,
            None => {}
        }
    }

    let dialect = if aspen_matches > server_matches {
        LogDialect::AspenLog
    } else {
        LogDialect::ServerLog
    };
    tracing::debug!(
        server_matches,
        aspen_matches,
        "Detected {dialect} dialect from sampled lines"
    );
    dialect
}

/// Replace every GUID-shaped token with [`GUID_PLACEHOLDER`] so exceptions
/// that only differ by a correlation id share one clustering key.
#[must_use]
pub fn normalize_exception_text(text: &str) -> String {
    GUID_PATTERN
        .replace_all(text, GUID_PLACEHOLDER)
        .into_owned()
}
