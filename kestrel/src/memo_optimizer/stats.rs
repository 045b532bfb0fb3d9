/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::errors::{StatsError, StatsResult};
use rustc_hash::FxHashMap;

/// Source of table statistics consulted while costing and estimating
/// cardinalities. Answers must stay stable for the duration of one
/// planning pass.
pub trait StatsProvider: Sync {
    fn row_count(&self, database: &str, table: &str) -> StatsResult<u64>;
}

/// Row counts per table, keyed case-insensitively
#[derive(Debug, Clone, Default)]
pub struct TableStats {
    row_counts: FxHashMap<(String, String), u64>,
}

impl TableStats {
    /// Creates a new empty TableStats instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, database: &str, table: &str, rows: u64) -> Self {
        self.set_row_count(database, table, rows);
        self
    }

    pub fn set_row_count(&mut self, database: &str, table: &str, rows: u64) {
        self.row_counts.insert(Self::key(database, table), rows);
    }

    pub fn len(&self) -> usize {
        self.row_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_counts.is_empty()
    }

    fn key(database: &str, table: &str) -> (String, String) {
        (database.to_lowercase(), table.to_lowercase())
    }
}

impl StatsProvider for TableStats {
    fn row_count(&self, database: &str, table: &str) -> StatsResult<u64> {
        self.row_counts
            .get(&Self::key(database, table))
            .copied()
            .ok_or_else(|| StatsError::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_is_case_insensitive() {
        let stats = TableStats::new().with_table("Shop", "Orders", 42);
        assert_eq!(stats.row_count("shop", "ORDERS"), Ok(42));
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn test_missing_table() {
        let stats = TableStats::new();
        assert_eq!(
            stats.row_count("shop", "orders"),
            Err(StatsError::TableNotFound {
                database: "shop".to_string(),
                table: "orders".to_string()
            })
        );
    }
}
