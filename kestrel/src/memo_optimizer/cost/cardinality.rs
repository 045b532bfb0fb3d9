/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::super::errors::CostResult;
use super::super::memo::Memo;
use super::super::operators::{JoinType, RelExpr};
use super::super::stats::StatsProvider;
use super::constants::{CostConstants, CostModel};
use super::injectivity::{is_injective_lookup, lookup_join_selectivity};

/// Row count of a base table, falling back to a fixed guess when the
/// provider has no statistics for it
pub(crate) fn scan_rows(stats: &dyn StatsProvider, database: &str, table: &str) -> f64 {
    stats
        .row_count(database, table)
        .unwrap_or(CostConstants::DEFAULT_TABLE_ROWS) as f64
}

/// Cardinality estimator for physical operators
#[derive(Debug, Clone, Default)]
pub struct Carder {
    model: CostModel,
}

impl Carder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: CostModel) -> Self {
        Self { model }
    }

    /// Estimates the output row count of `node` from its inputs' cached
    /// row counts
    pub fn estimate(
        &self,
        memo: &Memo,
        node: &RelExpr,
        stats: &dyn StatsProvider,
    ) -> CostResult<f64> {
        let opt = self.model.optimistic_join_sel;
        match node {
            RelExpr::TableScan {
                database, table, ..
            } => return Ok(scan_rows(stats, database, table)),
            RelExpr::Project { child, .. } | RelExpr::Distinct { child } => {
                return memo.card(*child)
            }
            RelExpr::Filter { child, .. } => {
                return Ok(memo.card(*child)? * CostConstants::FILTER_SELECTIVITY)
            }
            _ => {}
        }

        let Some(base) = node.join_base() else {
            return Ok(0.0);
        };
        let l = memo.card(base.left)?;
        let r = memo.card(base.right)?;

        match node {
            RelExpr::LookupJoin { lookup, .. } => {
                let injective = is_injective_lookup(
                    &lookup.index,
                    memo.fds(base.group)?,
                    memo.fds(base.right)?,
                    &lookup.key_exprs,
                    &lookup.nullmask,
                );
                if injective {
                    return Ok(l);
                }
                let sel = lookup_join_selectivity(&self.model, memo, base, lookup)?;
                return Ok(l * r * sel);
            }
            RelExpr::ConcatJoin { concat, .. } => {
                let mut sel = 0.0;
                for lookup in concat {
                    sel += lookup_join_selectivity(&self.model, memo, base, lookup)?;
                }
                return Ok(l * sel);
            }
            _ => {}
        }

        let card = match base.op {
            op if op.is_lateral() => l * r,
            op if op.is_partial() => opt * l,
            JoinType::LeftOuter => l.max(opt * l * r),
            JoinType::FullOuter => l.max(r).max(opt * l * r),
            _ => opt * l * r,
        };
        Ok(card)
    }
}
