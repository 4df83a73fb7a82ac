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

//! Access-log message bodies.
//!
//! The request logger writes one tab-delimited body per request:
//! `TENANT \t DURATION \t IP \t RESPONSE_CODE \t METHOD \t PATH \t SESSION_ID`.
//! `---` in the duration column means no timing was recorded, `---` in the
//! response code column means the request is still in flight.

use fancy_regex::Regex;
use std::sync::LazyLock;

/// Literal written for columns that have no value yet
pub const SENTINEL: &str = "---";

/// Unit suffix of the duration column
pub const DURATION_UNIT: &str = "ms";

static ACCESS_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<tenant>[^\t]*)\t(?P<duration>---|\d+ms)\t(?P<address>[^\t]*)\t(?P<code>---|\d+)\t(?P<method>[A-Z]+)\t(?P<path>[^\t]*)(?:\t(?P<session>[^\t]*))?$",
    )
    .expect("valid regex literal")
});

static SESSION_ID_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"jsessionid=.*").expect("valid regex literal"));

// 14 character object ids: three letters, then letters, digits or `$`
static OBJECT_ID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/[a-zA-Z]{3}[a-zA-Z$0-9]{11}/").expect("valid regex literal")
});

static OBJECT_COLLECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(banner|assignments|submissions)/.*").expect("valid regex literal")
});

/// Fields of a request or response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDetails {
    pub tenant: String,
    /// Milliseconds; `None` when the sentinel was logged
    pub duration: Option<u64>,
    pub client_address: String,
    /// Numeric code, or [`SENTINEL`] while the request is in flight
    pub response_code: String,
    pub http_method: String,
    pub path: String,
    pub session_id: String,
}

impl AccessDetails {
    /// Parse a message body. Returns `None` if it is not an access-log body.
    #[must_use]
    pub fn parse(message: &str) -> Option<Self> {
        let caps = ACCESS_BODY.captures(message).ok().flatten()?;
        let field = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Some(Self {
            tenant: field("tenant"),
            duration: parse_duration(&field("duration")),
            client_address: field("address"),
            response_code: field("code"),
            http_method: field("method"),
            path: field("path"),
            session_id: field("session"),
        })
    }

    /// A request whose response code has not been written yet
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.response_code == SENTINEL
    }

    /// Request path with query string, session ids and object ids removed so
    /// that requests for the same endpoint group together.
    #[must_use]
    pub fn deidentified_path(&self) -> String {
        deidentify_path(&self.path)
    }
}

fn parse_duration(raw: &str) -> Option<u64> {
    if raw == SENTINEL {
        return None;
    }
    raw.strip_suffix(DURATION_UNIT)?.parse().ok()
}

/// See [`AccessDetails::deidentified_path`].
#[must_use]
pub fn deidentify_path(path: &str) -> String {
    let path = path.split_once('?').map_or(path, |(before, _)| before);
    let path = SESSION_ID_PARAM.replace_all(path, "jsessionid");
    let path = OBJECT_ID_SEGMENT.replace_all(&path, "/*OID*/");
    OBJECT_COLLECTION
        .replace_all(&path, "/$1/*OID*")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let details = AccessDetails::parse("acme\t123ms\t10.0.0.1\t200\tGET\t/api/x\tsess1")
            .expect("should parse access body");
        assert_eq!(details.tenant, "acme");
        assert_eq!(details.duration, Some(123));
        assert_eq!(details.client_address, "10.0.0.1");
        assert_eq!(details.response_code, "200");
        assert_eq!(details.http_method, "GET");
        assert_eq!(details.path, "/api/x");
        assert_eq!(details.session_id, "sess1");
        assert!(!details.is_in_flight());
    }

    #[test]
    fn test_parse_in_flight_request() {
        let details = AccessDetails::parse("acme\t---\t10.0.0.1\t---\tPOST\t/api/x\tsess1")
            .expect("should parse access body");
        assert_eq!(details.duration, None);
        assert!(details.is_in_flight());
        assert_eq!(details.response_code, SENTINEL);
    }

    #[test]
    fn test_parse_missing_session_column() {
        // Trailing whitespace stripping removes an empty last column
        let details = AccessDetails::parse("acme\t5ms\t10.0.0.1\t404\tHEAD\t/favicon.ico")
            .expect("should parse access body");
        assert_eq!(details.session_id, "");
        assert_eq!(details.duration, Some(5));
    }

    #[test]
    fn test_rejects_other_messages() {
        assert!(AccessDetails::parse("Deploying app.war").is_none());
        assert!(AccessDetails::parse("acme\t12s\t10.0.0.1\t200\tGET\t/x\ts").is_none());
        assert!(AccessDetails::parse("acme\t12ms\t10.0.0.1\tOK\tGET\t/x\ts").is_none());
    }

    #[test]
    fn test_deidentify_query_and_session() {
        assert_eq!(deidentify_path("/aspen/home.do?x=1"), "/aspen/home.do");
        assert_eq!(
            deidentify_path("/aspen/logon.do;jsessionid=ABCDEF0123"),
            "/aspen/logon.do;jsessionid"
        );
    }

    #[test]
    fn test_deidentify_object_ids() {
        assert_eq!(
            deidentify_path("/aspen/rest/STD0000000Ab12/schedule"),
            "/aspen/rest/*OID*/schedule"
        );
        assert_eq!(
            deidentify_path("/aspen/rest/assignments/GCD000000abcd/files"),
            "/aspen/rest/assignments/*OID*"
        );
        assert_eq!(deidentify_path("/api/x"), "/api/x");
    }
}
