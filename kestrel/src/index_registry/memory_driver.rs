/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::driver::{
    Checksumable, Index, IndexConfig, IndexDriver, KeyValue, Partition, PartitionIter,
    PartitionKeyValueIter, CHECKSUM_KEY, UNIQUE_KEY,
};
use super::errors::{DriverError, DriverResult};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Index descriptor kept by `MemoryDriver`
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryIndex {
    id: String,
    database: String,
    table: String,
    expressions: Vec<String>,
    driver: String,
    config: IndexConfig,
}

impl MemoryIndex {
    pub fn new(
        database: &str,
        table: &str,
        id: &str,
        expressions: Vec<String>,
        driver: &str,
        config: IndexConfig,
    ) -> Self {
        Self {
            id: id.to_string(),
            database: database.to_string(),
            table: table.to_string(),
            expressions,
            driver: driver.to_string(),
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }
}

impl Checksumable for MemoryIndex {
    fn checksum(&self) -> DriverResult<String> {
        self.config
            .get(CHECKSUM_KEY)
            .cloned()
            .ok_or_else(|| DriverError::Checksum(format!("index {} has no checksum", self.id)))
    }
}

impl Index for MemoryIndex {
    fn id(&self) -> &str {
        &self.id
    }

    fn database(&self) -> &str {
        &self.database
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn expressions(&self) -> &[String] {
        &self.expressions
    }

    fn is_unique(&self) -> bool {
        self.config.get(UNIQUE_KEY).map_or(false, |v| v == "true")
    }

    fn driver(&self) -> &str {
        &self.driver
    }

    fn checksumable(&self) -> Option<&dyn Checksumable> {
        if self.config.contains_key(CHECKSUM_KEY) {
            Some(self)
        } else {
            None
        }
    }
}

type TableKey = (String, String);
type IndexData = BTreeMap<Partition, Vec<KeyValue>>;

/// Index driver keeping descriptors and index data in memory
#[derive(Debug, Default)]
pub struct MemoryDriver {
    id: String,
    /// Descriptors per (database, table), in creation order
    indexes: RwLock<FxHashMap<TableKey, Vec<Arc<MemoryIndex>>>>,
    /// Saved key values per (database, index id)
    data: RwLock<FxHashMap<(String, String), IndexData>>,
}

impl MemoryDriver {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    fn data_key(index: &dyn Index) -> (String, String) {
        (index.database().to_lowercase(), index.id().to_lowercase())
    }

    /// Number of key values saved for an index across all partitions
    pub fn saved_rows(&self, database: &str, id: &str) -> usize {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(&(database.to_lowercase(), id.to_lowercase()))
            .map_or(0, |parts| parts.values().map(Vec::len).sum())
    }

    /// Row locations stored under `key` for an index
    pub fn lookup(&self, database: &str, id: &str, key: &[serde_json::Value]) -> Vec<Vec<u8>> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(&(database.to_lowercase(), id.to_lowercase()))
            .into_iter()
            .flat_map(|parts| parts.values().flatten())
            .filter(|(k, _)| k.as_slice() == key)
            .map(|(_, location)| location.clone())
            .collect()
    }
}

impl IndexDriver for MemoryDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn create(
        &self,
        database: &str,
        table: &str,
        id: &str,
        expressions: Vec<String>,
        config: IndexConfig,
    ) -> DriverResult<Arc<dyn Index>> {
        let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
        let on_table = indexes
            .entry((database.to_lowercase(), table.to_lowercase()))
            .or_default();
        if on_table.iter().any(|idx| idx.id.eq_ignore_ascii_case(id)) {
            return Err(DriverError::Backend(format!(
                "index {} already exists on {}.{}",
                id, database, table
            )));
        }
        let index = Arc::new(MemoryIndex::new(
            database,
            table,
            id,
            expressions,
            &self.id,
            config,
        ));
        on_table.push(index.clone());
        Ok(index)
    }

    fn load_all(&self, database: &str, table: &str) -> DriverResult<Vec<Arc<dyn Index>>> {
        let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(indexes
            .get(&(database.to_lowercase(), table.to_lowercase()))
            .map(|on_table| {
                on_table
                    .iter()
                    .map(|idx| idx.clone() as Arc<dyn Index>)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn save(&self, index: &dyn Index, data: PartitionKeyValueIter) -> DriverResult<()> {
        let mut built = IndexData::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        for (partition, rows) in data {
            let stored = built.entry(partition).or_default();
            for row in rows {
                let (key, location) = row?;
                if index.is_unique() {
                    let rendered = serde_json::Value::Array(key.clone()).to_string();
                    if !seen.insert(rendered.clone()) {
                        return Err(DriverError::UniqueViolation {
                            id: index.id().to_string(),
                            key: rendered,
                        });
                    }
                }
                stored.push((key, location));
            }
        }

        let mut all = self.data.write().unwrap_or_else(PoisonError::into_inner);
        all.insert(Self::data_key(index), built);
        Ok(())
    }

    fn delete(&self, index: &dyn Index, partitions: PartitionIter) -> DriverResult<()> {
        {
            let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
            let table_key = (index.database().to_lowercase(), index.table().to_lowercase());
            let on_table = indexes
                .get_mut(&table_key)
                .ok_or_else(|| DriverError::IndexNotFound(index.id().to_string()))?;
            let before = on_table.len();
            on_table.retain(|idx| !idx.id.eq_ignore_ascii_case(index.id()));
            if on_table.len() == before {
                return Err(DriverError::IndexNotFound(index.id().to_string()));
            }
        }

        let mut all = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let key = Self::data_key(index);
        if let Some(parts) = all.get_mut(&key) {
            for partition in partitions {
                parts.remove(&partition);
            }
            if parts.is_empty() {
                all.remove(&key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::driver::KeyValueIter;
    use serde_json::json;

    fn rows(values: Vec<(serde_json::Value, u8)>) -> KeyValueIter {
        Box::new(values.into_iter().map(|(k, loc)| Ok((vec![k], vec![loc]))))
    }

    fn unique_config() -> IndexConfig {
        let mut config = IndexConfig::new();
        config.insert(UNIQUE_KEY.to_string(), "true".to_string());
        config
    }

    #[test]
    fn test_create_then_load_all() {
        let driver = MemoryDriver::new("mem");
        driver
            .create("foo", "bar", "idx1", vec!["a".to_string()], IndexConfig::new())
            .unwrap();
        let loaded = driver.load_all("FOO", "bar").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), "idx1");
        assert_eq!(loaded[0].driver(), "mem");
        assert!(loaded[0].checksumable().is_none());

        assert!(driver
            .create("foo", "bar", "IDX1", vec!["b".to_string()], IndexConfig::new())
            .is_err());
    }

    #[test]
    fn test_save_and_lookup() {
        let driver = MemoryDriver::new("mem");
        let index = driver
            .create("foo", "bar", "idx1", vec!["a".to_string()], IndexConfig::new())
            .unwrap();
        let data: PartitionKeyValueIter = Box::new(
            vec![
                (Partition::new("p1"), rows(vec![(json!(1), 0), (json!(2), 1)])),
                (Partition::new("p2"), rows(vec![(json!(1), 2)])),
            ]
            .into_iter(),
        );
        driver.save(index.as_ref(), data).unwrap();
        assert_eq!(driver.saved_rows("foo", "idx1"), 3);
        assert_eq!(driver.lookup("foo", "idx1", &[json!(1)]), vec![vec![0], vec![2]]);
    }

    #[test]
    fn test_unique_index_rejects_duplicate_keys() {
        let driver = MemoryDriver::new("mem");
        let index = driver
            .create("foo", "bar", "uk", vec!["a".to_string()], unique_config())
            .unwrap();
        assert!(index.is_unique());
        let data: PartitionKeyValueIter = Box::new(
            vec![
                (Partition::new("p1"), rows(vec![(json!("x"), 0)])),
                (Partition::new("p2"), rows(vec![(json!("x"), 1)])),
            ]
            .into_iter(),
        );
        let err = driver.save(index.as_ref(), data).unwrap_err();
        assert!(matches!(err, DriverError::UniqueViolation { .. }));
        assert_eq!(driver.saved_rows("foo", "uk"), 0);
    }

    #[test]
    fn test_delete_drops_descriptor_and_partitions() {
        let driver = MemoryDriver::new("mem");
        let index = driver
            .create("foo", "bar", "idx1", vec!["a".to_string()], IndexConfig::new())
            .unwrap();
        let data: PartitionKeyValueIter = Box::new(
            vec![
                (Partition::new("p1"), rows(vec![(json!(1), 0)])),
                (Partition::new("p2"), rows(vec![(json!(2), 1)])),
            ]
            .into_iter(),
        );
        driver.save(index.as_ref(), data).unwrap();

        let partitions: PartitionIter = Box::new(vec![Partition::new("p1")].into_iter());
        driver.delete(index.as_ref(), partitions).unwrap();
        assert!(driver.load_all("foo", "bar").unwrap().is_empty());
        assert_eq!(driver.saved_rows("foo", "idx1"), 1);

        let partitions: PartitionIter = Box::new(std::iter::empty());
        assert!(matches!(
            driver.delete(index.as_ref(), partitions),
            Err(DriverError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_checksum_comes_from_config() {
        let mut config = IndexConfig::new();
        config.insert(CHECKSUM_KEY.to_string(), "abc".to_string());
        let index = MemoryIndex::new("foo", "bar", "idx1", vec![], "mem", config);
        let checksum = index.checksumable().unwrap().checksum().unwrap();
        assert_eq!(checksum, "abc");
    }
}
