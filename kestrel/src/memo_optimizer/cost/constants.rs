/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::super::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// Default weights of the cost model
pub struct CostConstants;

impl CostConstants {
    /// CPU work spent on one row
    pub const CPU_COST_FACTOR: f64 = 0.01;
    /// Reading one row sequentially
    pub const SEQ_IO_COST_FACTOR: f64 = 1.0;
    /// Reading one row through a random seek
    pub const RAND_IO_COST_FACTOR: f64 = 2.0;
    /// Inserting one row into an in-memory hash table
    pub const MEM_COST_FACTOR: f64 = 2.0;
    /// Discount applied to the union of several index lookups
    pub const CONCAT_COST_FACTOR: f64 = 0.75;
    /// Multiplier for joins that degrade into a cartesian product
    pub const DEGENERATE_PENALTY: f64 = 2.0;
    /// Join selectivity assumed when nothing better is known
    pub const OPTIMISTIC_JOIN_SEL: f64 = 0.10;
    /// Magnitude of the negative cost returned by biased costers
    pub const BIAS_FACTOR: f64 = 1e5;
    /// Selectivity reduction for each additional equality key
    pub const PER_KEY_COST_REDUCTION_FACTOR: f64 = 0.5;
    /// Row count assumed for tables without statistics
    pub const DEFAULT_TABLE_ROWS: u64 = 1000;
    /// Fraction of rows assumed to survive a filter
    pub const FILTER_SELECTIVITY: f64 = 0.75;
}

/// Tunable weights used by the coster and the cardinality estimator.
///
/// Every field falls back to its `CostConstants` default, so a JSON document
/// only needs to name the weights it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub cpu_cost_factor: f64,
    pub seq_io_cost_factor: f64,
    pub rand_io_cost_factor: f64,
    pub mem_cost_factor: f64,
    pub concat_cost_factor: f64,
    pub degenerate_penalty: f64,
    pub optimistic_join_sel: f64,
    pub bias_factor: f64,
    pub per_key_cost_reduction_factor: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            cpu_cost_factor: CostConstants::CPU_COST_FACTOR,
            seq_io_cost_factor: CostConstants::SEQ_IO_COST_FACTOR,
            rand_io_cost_factor: CostConstants::RAND_IO_COST_FACTOR,
            mem_cost_factor: CostConstants::MEM_COST_FACTOR,
            concat_cost_factor: CostConstants::CONCAT_COST_FACTOR,
            degenerate_penalty: CostConstants::DEGENERATE_PENALTY,
            optimistic_join_sel: CostConstants::OPTIMISTIC_JOIN_SEL,
            bias_factor: CostConstants::BIAS_FACTOR,
            per_key_cost_reduction_factor: CostConstants::PER_KEY_COST_REDUCTION_FACTOR,
        }
    }
}

impl CostModel {
    /// Parses a (possibly partial) JSON document and validates the result
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let model: CostModel = serde_json::from_str(doc)?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("cpu_cost_factor", self.cpu_cost_factor),
            ("seq_io_cost_factor", self.seq_io_cost_factor),
            ("rand_io_cost_factor", self.rand_io_cost_factor),
            ("mem_cost_factor", self.mem_cost_factor),
            ("concat_cost_factor", self.concat_cost_factor),
            ("degenerate_penalty", self.degenerate_penalty),
            ("optimistic_join_sel", self.optimistic_join_sel),
            ("bias_factor", self.bias_factor),
            ("per_key_cost_reduction_factor", self.per_key_cost_reduction_factor),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Constraint(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        if self.rand_io_cost_factor <= self.seq_io_cost_factor {
            return Err(ConfigError::Constraint(
                "rand_io_cost_factor must exceed seq_io_cost_factor".to_string(),
            ));
        }
        if self.mem_cost_factor <= self.seq_io_cost_factor {
            return Err(ConfigError::Constraint(
                "mem_cost_factor must exceed seq_io_cost_factor".to_string(),
            ));
        }
        for (name, value) in [
            ("optimistic_join_sel", self.optimistic_join_sel),
            ("per_key_cost_reduction_factor", self.per_key_cost_reduction_factor),
        ] {
            if value <= 0.0 || value > 1.0 {
                return Err(ConfigError::Constraint(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
