/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Interfaces between the registry, index backends and the storage layer

use super::errors::DriverResult;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Config key holding the table checksum an index was built against
pub const CHECKSUM_KEY: &str = "checksum";

/// Config key marking an index as unique (`"true"`)
pub const UNIQUE_KEY: &str = "unique";

/// Driver specific index options
pub type IndexConfig = BTreeMap<String, String>;

/// Something whose content can be summarized as a checksum
pub trait Checksumable {
    fn checksum(&self) -> DriverResult<String>;
}

/// A secondary index as the registry sees it
pub trait Index: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;
    fn database(&self) -> &str;
    fn table(&self) -> &str;
    /// Indexed expressions, in index order
    fn expressions(&self) -> &[String];
    fn is_unique(&self) -> bool;
    /// Id of the driver that owns the index storage
    fn driver(&self) -> &str;

    fn checksumable(&self) -> Option<&dyn Checksumable> {
        None
    }
}

/// Named slice of a table's rows
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition(pub String);

impl Partition {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Index key values of one row and the row's location
pub type KeyValue = (Vec<serde_json::Value>, Vec<u8>);

/// Key values of the rows of one partition
pub type KeyValueIter = Box<dyn Iterator<Item = DriverResult<KeyValue>> + Send>;

/// Every partition of a table with the key values of its rows
pub type PartitionKeyValueIter = Box<dyn Iterator<Item = (Partition, KeyValueIter)> + Send>;

pub type PartitionIter = Box<dyn Iterator<Item = Partition> + Send>;

/// Storage backend able to create, persist and discover indexes
pub trait IndexDriver: Send + Sync {
    fn id(&self) -> &str;

    /// Creates the descriptor of a new, still empty index
    fn create(
        &self,
        database: &str,
        table: &str,
        id: &str,
        expressions: Vec<String>,
        config: IndexConfig,
    ) -> DriverResult<Arc<dyn Index>>;

    /// Returns every index the backend holds for a table
    fn load_all(&self, database: &str, table: &str) -> DriverResult<Vec<Arc<dyn Index>>>;

    /// Builds the index from the key values of every partition
    fn save(&self, index: &dyn Index, data: PartitionKeyValueIter) -> DriverResult<()>;

    /// Drops the index data held for the given partitions
    fn delete(&self, index: &dyn Index, partitions: PartitionIter) -> DriverResult<()>;
}

pub trait Table: Send + Sync {
    fn name(&self) -> &str;
    fn partitions(&self) -> Vec<Partition>;

    fn checksumable(&self) -> Option<&dyn Checksumable> {
        None
    }
}

pub trait Database: Send + Sync {
    fn name(&self) -> &str;
    fn table_names(&self) -> Vec<String>;
    fn table(&self, name: &str) -> Option<Arc<dyn Table>>;
}
