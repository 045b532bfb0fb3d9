/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Concurrent registry of secondary indexes
//!
//! Every index moves through `NotReady -> Ready` once its build completes,
//! or `NotReady -> Outdated` when it is loaded against a table whose
//! checksum changed since it was built. Only ready indexes are handed out
//! to queries, which retain them while in use; deleting a retained index
//! is deferred until the last reader releases it.
//!
//! ## Usage
//!
//! ```rust
//! use kestrel::index_registry::{Index, IndexRegistry, MemoryDriver, IndexDriver, IndexConfig};
//!
//! let registry = IndexRegistry::new();
//! let driver = MemoryDriver::new("mem");
//! let index = driver
//!     .create("shop", "orders", "by_customer", vec!["customer_id".to_string()], IndexConfig::new())
//!     .unwrap();
//!
//! let (build, ready) = registry.add_index(index.clone()).unwrap();
//! assert!(!registry.can_use_index(index.as_ref()));
//!
//! build.finish();
//! assert!(ready.wait());
//! assert!(registry.can_use_index(index.as_ref()));
//! ```

pub mod ddl;
pub mod driver;
pub mod errors;
pub mod memory_driver;
pub mod registry;
pub mod signal;
pub mod status;

pub use ddl::IndexDefinition;
pub use driver::{
    Checksumable, Database, Index, IndexConfig, IndexDriver, KeyValue, KeyValueIter, Partition,
    PartitionIter, PartitionKeyValueIter, Table, CHECKSUM_KEY, UNIQUE_KEY,
};
pub use errors::{DriverError, DriverResult, RegistryError, RegistryResult};
pub use memory_driver::{MemoryDriver, MemoryIndex};
pub use registry::{IndexKey, IndexRegistry};
pub use signal::{CompletionSignal, DeleteSignal, IndexBuild, ReadySignal, RetainedIndex};
pub use status::IndexStatus;
