/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Error types for costing, statistics and cost model configuration

use super::memo::GroupId;
use super::operators::JoinType;
use thiserror::Error;

/// Result type for costing operations
pub type CostResult<T> = Result<T, CostError>;

/// Errors raised while pricing a plan candidate.
///
/// None of these abort a whole planning attempt: the search discards the
/// candidate that produced it and keeps exploring its siblings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CostError {
    /// A join node carries an operator kind no cost rule exists for
    #[error("coster does not support join type {op} for {node}")]
    UnhandledJoinType { node: &'static str, op: JoinType },

    /// The first merge join filter is not an equality comparison
    #[error("merge join expects an equality comparison as its first filter, found {0}")]
    MergeJoinExpectsComparer(String),

    #[error("unknown memo group {0}")]
    UnknownGroup(GroupId),

    #[error("memo group {0} has no members")]
    EmptyGroup(GroupId),

    /// A member reads from a group that is not older than its own
    #[error("memo group {group} cannot read from group {child}")]
    InvalidChild { group: GroupId, child: GroupId },

    /// Every candidate of a group failed to cost
    #[error("no viable plan for group {group}: {source}")]
    NoViablePlan {
        group: GroupId,
        #[source]
        source: Box<CostError>,
    },
}

/// Result type for statistics lookups
pub type StatsResult<T> = Result<T, StatsError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("no statistics for table {database}.{table}")]
    TableNotFound { database: String, table: String },
}

/// Errors raised while loading a cost model
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid cost model document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A weight violates the ordering or range the cost formulas rely on
    #[error("invalid cost model: {0}")]
    Constraint(String),
}
