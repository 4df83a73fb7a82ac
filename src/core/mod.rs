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

pub mod analysis;
pub mod exceptions;
pub mod loader;
pub mod perfmon;
pub mod query;
pub mod reconstruct;
pub mod tools;

pub use analysis::Analysis;
pub use exceptions::{cluster_exceptions, ExceptionCluster};
pub use loader::{load_file, load_files, load_optional, LoadError, LoadedLog, RejectedFile};
pub use reconstruct::{reconstruct, Reconstruction, Reconstructor};
pub use tools::{check_tool_markers, track_tool_spans, ToolSpan, ToolSpanError};
