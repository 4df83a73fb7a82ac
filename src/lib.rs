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

//! `WildCrab` rebuilds logical records from Java application server logs
//! and derives exception clusters, tool concurrency and response-time
//! reports from them.

pub mod config;
pub mod core;
pub mod parser;
pub mod report;

pub use crate::core::{Analysis, LoadedLog};
pub use crate::parser::record::{LogRecord, RecordKind};
pub use crate::parser::LogDialect;
