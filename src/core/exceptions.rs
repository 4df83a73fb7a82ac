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

//! Frequency-ranked exception clusters.

use crate::parser::record::LogRecord;
use indexmap::IndexMap;
use std::cmp::Reverse;

/// Exception records sharing one normalized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionCluster {
    pub normalized_text: String,
    /// Positions of the member records in the clustered slice, in record order
    pub members: Vec<usize>,
}

impl ExceptionCluster {
    fn new(normalized_text: String, first: usize) -> Self {
        Self {
            normalized_text,
            members: vec![first],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total order: size descending, then normalized text descending.
    #[must_use]
    pub fn ordering_key(&self) -> (Reverse<usize>, Reverse<&str>) {
        (Reverse(self.len()), Reverse(self.normalized_text.as_str()))
    }

    /// Member records resolved against the slice that was clustered
    pub fn records<'a>(&'a self, records: &'a [LogRecord]) -> impl Iterator<Item = &'a LogRecord> {
        self.members.iter().filter_map(|&pos| records.get(pos))
    }
}

/// Group exception records by normalized text and rank the groups.
#[must_use]
pub fn cluster_exceptions(records: &[LogRecord]) -> Vec<ExceptionCluster> {
    profiling::scope!("cluster_exceptions");
    let mut clusters: IndexMap<String, ExceptionCluster> = IndexMap::new();

    for (pos, record) in records.iter().enumerate() {
        let Some(text) = record.normalized_exception_text() else {
            continue;
        };
        if let Some(cluster) = clusters.get_mut(&text) {
            cluster.members.push(pos);
        } else {
            clusters.insert(text.clone(), ExceptionCluster::new(text, pos));
        }
    }

    let mut ranked: Vec<ExceptionCluster> = clusters.into_values().collect();
    ranked.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));
    tracing::debug!(clusters = ranked.len(), "Clustered exceptions");
    ranked
}

/// Number of exception records across all clusters
#[must_use]
pub fn exception_total(clusters: &[ExceptionCluster]) -> usize {
    clusters.iter().map(ExceptionCluster::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reconstruct::reconstruct;
    use crate::parser::LogDialect;

    fn records(lines: &[&str]) -> Vec<LogRecord> {
        reconstruct(LogDialect::ServerLog, lines.iter().copied()).records
    }

    #[test]
    fn test_ranking_by_size_then_text() {
        let records = records(&[
            "2024-01-01 10:00:00,000 ERROR [A] (t1) AException: a",
            "2024-01-01 10:00:00,001 ERROR [A] (t1) BException: b",
            "2024-01-01 10:00:00,002 INFO [A] (t1) nothing to see",
            "2024-01-01 10:00:00,003 ERROR [A] (t1) CException: c",
            "2024-01-01 10:00:00,004 ERROR [A] (t1) AException: a",
        ]);
        let clusters = cluster_exceptions(&records);
        let ranked: Vec<(&str, usize)> = clusters
            .iter()
            .map(|c| (c.normalized_text.as_str(), c.len()))
            .collect();
        assert_eq!(
            ranked,
            vec![("AException: a", 2), ("CException: c", 1), ("BException: b", 1)]
        );
        assert_eq!(clusters[0].members, vec![0, 4]);
        assert_eq!(exception_total(&clusters), 4);
    }

    #[test]
    fn test_guid_variants_share_cluster() {
        let records = records(&[
            "2024-01-01 10:00:00,000 ERROR [A] (t1) LockException: 550e8400-e29b-41d4-a716-446655440000",
            "2024-01-01 10:00:00,001 ERROR [A] (t2) LockException: 123e4567-e89b-12d3-a456-426614174000",
        ]);
        let clusters = cluster_exceptions(&records);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].normalized_text, "LockException: <GUID>");
        assert_eq!(clusters[0].records(&records).count(), 2);
    }

    #[test]
    fn test_cause_chain_separates_clusters() {
        let records = records(&[
            "2024-01-01 10:00:00,000 ERROR [A] (t1) EJBException: failed",
            "Caused by: java.sql.SQLException: deadlock",
            "2024-01-01 10:00:00,001 ERROR [A] (t1) EJBException: failed",
            "Caused by: java.io.IOException: closed",
        ]);
        let clusters = cluster_exceptions(&records);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_clustering_is_idempotent() {
        let records = records(&[
            "2024-01-01 10:00:00,000 ERROR [A] (t1) XException: x",
            "2024-01-01 10:00:00,001 ERROR [A] (t1) YException: y",
            "2024-01-01 10:00:00,002 ERROR [A] (t1) XException: x",
        ]);
        assert_eq!(cluster_exceptions(&records), cluster_exceptions(&records));
    }

    #[test]
    fn test_no_exceptions() {
        let records = records(&["2024-01-01 10:00:00,000 INFO [A] (t1) fine"]);
        assert!(cluster_exceptions(&records).is_empty());
        assert!(cluster_exceptions(&[]).is_empty());
    }
}
