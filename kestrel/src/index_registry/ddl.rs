/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! CREATE INDEX and DROP INDEX on top of the registry and a driver

use super::driver::{Index, IndexConfig, IndexDriver, PartitionIter, PartitionKeyValueIter, UNIQUE_KEY};
use super::errors::{RegistryError, RegistryResult};
use super::registry::IndexRegistry;
use super::signal::ReadySignal;
use log::{debug, error};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Everything needed to create an index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub database: String,
    pub table: String,
    pub id: String,
    pub expressions: Vec<String>,
    pub config: IndexConfig,
}

impl IndexDefinition {
    pub fn new<S: Into<String>>(database: &str, table: &str, id: &str, expressions: Vec<S>) -> Self {
        Self {
            database: database.to_string(),
            table: table.to_string(),
            id: id.to_string(),
            expressions: expressions.into_iter().map(Into::into).collect(),
            config: IndexConfig::new(),
        }
    }

    pub fn unique(mut self) -> Self {
        self.config.insert(UNIQUE_KEY.to_string(), "true".to_string());
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.config.insert(key.to_string(), value.to_string());
        self
    }
}

impl IndexRegistry {
    fn resolve_driver(&self, driver: Option<&str>) -> RegistryResult<Arc<dyn IndexDriver>> {
        match driver {
            Some(id) => self
                .index_driver(id)
                .ok_or_else(|| RegistryError::DriverNotFound(id.to_string())),
            None => self
                .default_index_driver()
                .ok_or_else(|| RegistryError::DriverNotFound("default".to_string())),
        }
    }

    /// Creates an index and builds it in the background.
    ///
    /// The index is registered as not ready before this returns. A worker
    /// thread hands `data` to the driver and promotes the index once the
    /// driver has saved it; if saving fails the index stays not ready and
    /// the returned signal never fires.
    pub fn create_index(
        &self,
        driver: Option<&str>,
        definition: IndexDefinition,
        data: PartitionKeyValueIter,
    ) -> RegistryResult<(Arc<dyn Index>, ReadySignal)> {
        let driver = self.resolve_driver(driver)?;
        let index = driver.create(
            &definition.database,
            &definition.table,
            &definition.id,
            definition.expressions,
            definition.config,
        )?;

        let (build, ready) = match self.add_index(index.clone()) {
            Ok(handles) => handles,
            Err(err) => {
                if let Err(cleanup) = driver.delete(index.as_ref(), Box::new(std::iter::empty())) {
                    error!("cannot discard rejected index {}: {}", index.id(), cleanup);
                }
                return Err(err);
            }
        };

        let worker_index = index.clone();
        thread::spawn(move || match driver.save(worker_index.as_ref(), data) {
            Ok(()) => {
                if !build.finish() {
                    debug!("index {} deleted while building", worker_index.id());
                }
            }
            Err(err) => error!(
                "building index {}.{} failed: {}",
                worker_index.database(),
                worker_index.id(),
                err
            ),
        });

        Ok((index, ready))
    }

    /// Deletes an index and, once the last reader has released it, drops its
    /// storage for `partitions` through its driver. The returned handle
    /// joins that background cleanup.
    pub fn drop_index(
        &self,
        database: &str,
        id: &str,
        force: bool,
        partitions: PartitionIter,
    ) -> RegistryResult<JoinHandle<RegistryResult<()>>> {
        let index = self
            .index(database, id)
            .ok_or_else(|| RegistryError::IndexNotFound {
                database: database.to_string(),
                id: id.to_string(),
            })?;
        let driver = self
            .index_driver(index.driver())
            .ok_or_else(|| RegistryError::DriverNotFound(index.driver().to_string()))?;
        let deleted = self.delete_index(database, id, force)?;

        Ok(thread::spawn(move || {
            if !deleted.wait() {
                return Ok(());
            }
            driver.delete(index.as_ref(), partitions)?;
            debug!("dropped storage of index {}.{}", index.database(), index.id());
            Ok(())
        }))
    }
}
