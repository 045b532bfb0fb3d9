/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Error types for the index registry and index drivers

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("index {id} already registered in database {database}")]
    IndexIdAlreadyRegistered { database: String, id: String },

    /// Another building or ready index on the table covers the same
    /// expressions
    #[error("an index on {database}.{table} already covers expressions {expressions:?}")]
    IndexExpressionAlreadyRegistered {
        database: String,
        table: String,
        expressions: Vec<String>,
    },

    #[error("cannot delete index {id} in status {status} without force")]
    IndexDeleteInvalidStatus { id: String, status: String },

    #[error("index {id} not found in database {database}")]
    IndexNotFound { database: String, id: String },

    #[error("index driver {0} not registered")]
    DriverNotFound(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Failures reported by an index storage backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("index backend error: {0}")]
    Backend(String),

    #[error("table {database}.{table} not found")]
    TableNotFound { database: String, table: String },

    #[error("cannot compute checksum: {0}")]
    Checksum(String),

    /// A unique index received the same key twice
    #[error("duplicate key {key} for unique index {id}")]
    UniqueViolation { id: String, key: String },

    #[error("index {0} not found in driver")]
    IndexNotFound(String),
}
