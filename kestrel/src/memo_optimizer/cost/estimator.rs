/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::super::errors::{CostError, CostResult};
use super::super::memo::Memo;
use super::super::operators::{IndexRef, JoinBase, Lookup, RelExpr};
use super::super::stats::StatsProvider;
use super::cardinality::scan_rows;
use super::constants::CostModel;
use super::injectivity::{
    is_injective_lookup, is_injective_merge, key_selectivity, lookup_join_selectivity,
    merge_comparison,
};

/// Prices a single physical operator.
///
/// The cost covers the operator's own work only; inputs are priced through
/// their groups. Implementations hold no mutable state, so plan search can
/// call them from several threads at once.
pub trait Coster: Send + Sync {
    fn estimate_cost(
        &self,
        memo: &Memo,
        node: &RelExpr,
        stats: &dyn StatsProvider,
    ) -> CostResult<f64>;
}

/// Cost estimator for physical operators
#[derive(Debug, Clone, Default)]
pub struct DefaultCoster {
    model: CostModel,
}

impl DefaultCoster {
    /// Creates a coster with the default weights
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: CostModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &CostModel {
        &self.model
    }

    /// Nested loop over every pair of input rows
    fn nested_loop(&self, l: f64, r: f64) -> f64 {
        (l * r - 1.0) * self.model.seq_io_cost_factor + (l * r) * self.model.cpu_cost_factor
    }

    fn join_cost(&self, memo: &Memo, node: &RelExpr, base: &JoinBase) -> CostResult<f64> {
        if !node.supports_join_type(base.op) {
            return Err(CostError::UnhandledJoinType {
                node: node.name(),
                op: base.op,
            });
        }

        let m = &self.model;
        let l = memo.card(base.left)?;
        let r = memo.card(base.right)?;

        let cost = match node {
            RelExpr::InnerJoin(_) | RelExpr::LateralJoin(_) | RelExpr::LeftOuterJoin(_) => {
                self.nested_loop(l, r)
            }
            RelExpr::DegenerateJoin(_) | RelExpr::FullOuterJoin(_) => {
                self.nested_loop(l, r) * m.degenerate_penalty
            }
            RelExpr::HashJoin { .. } => {
                if base.op.is_partial() {
                    l * (r / 2.0) * (m.seq_io_cost_factor + m.cpu_cost_factor) * 0.5
                } else {
                    l * (m.seq_io_cost_factor + m.cpu_cost_factor)
                        + r * (m.seq_io_cost_factor + m.mem_cost_factor)
                        + m.optimistic_join_sel * l * r * m.cpu_cost_factor
                }
            }
            RelExpr::MergeJoin {
                left_index,
                right_index,
                ..
            } => self.merge_cost(memo, base, left_index, right_index, l, r)?,
            RelExpr::LookupJoin { lookup, .. } => self.lookup_cost(memo, base, lookup, l, r)?,
            RelExpr::ConcatJoin { concat, .. } => {
                let mut sel = 0.0;
                for lookup in concat {
                    sel += lookup_join_selectivity(m, memo, base, lookup)?;
                }
                l * sel * m.concat_cost_factor * (m.rand_io_cost_factor + m.cpu_cost_factor)
                    - r * m.seq_io_cost_factor
            }
            RelExpr::RangeHeapJoin { .. } => {
                l * (r * m.per_key_cost_reduction_factor) * m.seq_io_cost_factor
            }
            RelExpr::AntiJoin(_) | RelExpr::SemiJoin(_) | RelExpr::PartialJoin(_) => {
                l * m.seq_io_cost_factor
                    + l * (r / 2.0) * (m.seq_io_cost_factor + m.cpu_cost_factor)
            }
            RelExpr::TableScan { .. }
            | RelExpr::Project { .. }
            | RelExpr::Distinct { .. }
            | RelExpr::Filter { .. } => {
                return Err(CostError::UnhandledJoinType {
                    node: node.name(),
                    op: base.op,
                })
            }
        };
        Ok(cost)
    }

    fn merge_cost(
        &self,
        memo: &Memo,
        base: &JoinBase,
        left_index: &IndexRef,
        right_index: &IndexRef,
        l: f64,
        r: f64,
    ) -> CostResult<f64> {
        let m = &self.model;
        let (left_exprs, right_exprs) = merge_comparison(base)?;
        if is_injective_merge(memo, base, left_index, right_index, &left_exprs, &right_exprs)? {
            return Ok((l + r) * (m.seq_io_cost_factor + m.cpu_cost_factor));
        }
        let sel = key_selectivity(m, left_exprs.len());
        Ok(l + r + (l + r + l * r * sel) * m.cpu_cost_factor)
    }

    fn lookup_cost(
        &self,
        memo: &Memo,
        base: &JoinBase,
        lookup: &Lookup,
        l: f64,
        r: f64,
    ) -> CostResult<f64> {
        let m = &self.model;
        let injective = is_injective_lookup(
            &lookup.index,
            memo.fds(base.group)?,
            memo.fds(base.right)?,
            &lookup.key_exprs,
            &lookup.nullmask,
        );
        if injective {
            return Ok(l * (m.seq_io_cost_factor + m.cpu_cost_factor + m.rand_io_cost_factor));
        }

        let sel = lookup_join_selectivity(m, memo, base, lookup)?;
        if l * r * sel < l {
            let index_cols = lookup.index.cols.len();
            let coverage = if index_cols == 0 {
                0.0
            } else {
                let matched = lookup.key_exprs.len().min(index_cols);
                1.0 - (index_cols - matched) as f64 / index_cols as f64
            };
            Ok(l * m.seq_io_cost_factor
                + (l + 1.0 + coverage) * (m.cpu_cost_factor + m.rand_io_cost_factor))
        } else {
            Ok(l * m.seq_io_cost_factor
                + l * r * sel * (m.cpu_cost_factor + m.rand_io_cost_factor))
        }
    }
}

impl Coster for DefaultCoster {
    fn estimate_cost(
        &self,
        memo: &Memo,
        node: &RelExpr,
        stats: &dyn StatsProvider,
    ) -> CostResult<f64> {
        let m = &self.model;
        match node {
            RelExpr::TableScan {
                database, table, ..
            } => Ok(scan_rows(stats, database, table) * m.seq_io_cost_factor),
            RelExpr::Project { child, .. } => Ok(memo.card(*child)? * m.cpu_cost_factor),
            RelExpr::Distinct { child } => {
                Ok(memo.card(*child)? * (m.cpu_cost_factor + 0.75 * m.mem_cost_factor))
            }
            RelExpr::Filter { child, filters } => {
                Ok(memo.card(*child)? * m.cpu_cost_factor * filters.len() as f64)
            }
            RelExpr::InnerJoin(base)
            | RelExpr::AntiJoin(base)
            | RelExpr::SemiJoin(base)
            | RelExpr::LeftOuterJoin(base)
            | RelExpr::FullOuterJoin(base)
            | RelExpr::LateralJoin(base)
            | RelExpr::DegenerateJoin(base)
            | RelExpr::PartialJoin(base)
            | RelExpr::HashJoin { base, .. }
            | RelExpr::MergeJoin { base, .. }
            | RelExpr::LookupJoin { base, .. }
            | RelExpr::ConcatJoin { base, .. }
            | RelExpr::RangeHeapJoin { base, .. } => self.join_cost(memo, node, base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo_optimizer::memo::GroupId;
    use crate::memo_optimizer::operators::JoinType;
    use crate::memo_optimizer::scalar::ScalarExpr;
    use crate::memo_optimizer::stats::TableStats;

    const EPS: f64 = 1e-9;

    fn memo_with(l: f64, r: f64) -> (Memo, JoinBase) {
        let mut memo = Memo::new();
        let a = memo.add_scan("db", "a", 0);
        let b = memo.add_scan("db", "b", 1);
        memo.set_card(a, l).unwrap();
        memo.set_card(b, r).unwrap();
        let join = memo.new_group();
        (memo, JoinBase::new(join, a, b, JoinType::Inner))
    }

    fn cost(memo: &Memo, node: &RelExpr) -> f64 {
        DefaultCoster::new()
            .estimate_cost(memo, node, &TableStats::new())
            .unwrap()
    }

    #[test]
    fn test_table_scan_uses_stats_or_default() {
        let memo = Memo::new();
        let scan = RelExpr::table_scan("db", "t", 0);
        let coster = DefaultCoster::new();
        let known = TableStats::new().with_table("db", "t", 50);
        assert_eq!(coster.estimate_cost(&memo, &scan, &known).unwrap(), 50.0);
        assert_eq!(
            coster.estimate_cost(&memo, &scan, &TableStats::new()).unwrap(),
            1000.0
        );
    }

    #[test]
    fn test_unary_operators() {
        let (memo, base) = memo_with(100.0, 1.0);
        let project = RelExpr::Project {
            child: base.left,
            projections: vec![],
        };
        let distinct = RelExpr::Distinct { child: base.left };
        let filter = RelExpr::Filter {
            child: base.left,
            filters: vec![ScalarExpr::literal("1"), ScalarExpr::literal("2")],
        };
        assert!((cost(&memo, &project) - 1.0).abs() < EPS);
        assert!((cost(&memo, &distinct) - 100.0 * (0.01 + 1.5)).abs() < EPS);
        assert!((cost(&memo, &filter) - 2.0).abs() < EPS);
    }

    #[test]
    fn test_nested_loop_variants() {
        let (memo, base) = memo_with(10.0, 20.0);
        let inner = cost(&memo, &RelExpr::InnerJoin(base.clone()));
        assert!((inner - (199.0 + 2.0)).abs() < EPS);

        let degenerate = cost(&memo, &RelExpr::DegenerateJoin(base.clone()));
        assert!((degenerate - 2.0 * inner).abs() < EPS);

        let mut outer = base.clone();
        outer.op = JoinType::LeftOuter;
        assert!((cost(&memo, &RelExpr::LeftOuterJoin(outer.clone())) - inner).abs() < EPS);
        outer.op = JoinType::FullOuter;
        assert!((cost(&memo, &RelExpr::FullOuterJoin(outer)) - 2.0 * inner).abs() < EPS);
    }

    #[test]
    fn test_hash_join_partial_and_full() {
        let (memo, mut base) = memo_with(10.0, 20.0);
        let full = cost(&memo, &RelExpr::hash_join(base.clone(), vec![], vec![]));
        assert!((full - (10.1 + 60.0 + 0.2)).abs() < EPS);

        base.op = JoinType::Semi;
        let partial = cost(&memo, &RelExpr::hash_join(base, vec![], vec![]));
        assert!((partial - 10.0 * 10.0 * 1.01 * 0.5).abs() < EPS);
    }

    #[test]
    fn test_partial_and_range_heap() {
        let (memo, mut base) = memo_with(10.0, 20.0);
        base.op = JoinType::Anti;
        let anti = cost(&memo, &RelExpr::AntiJoin(base.clone()));
        assert!((anti - (10.0 + 10.0 * 10.0 * 1.01)).abs() < EPS);

        base.op = JoinType::Inner;
        let range = RelExpr::RangeHeapJoin {
            base,
            range_heap: crate::memo_optimizer::operators::RangeHeap {
                value_col: ScalarExpr::col(1, 0, "a.v"),
                min_col: ScalarExpr::col(10, 1, "b.lo"),
                max_col: ScalarExpr::col(11, 1, "b.hi"),
            },
        };
        assert!((cost(&memo, &range) - 100.0).abs() < EPS);
    }

    #[test]
    fn test_unhandled_join_type() {
        let (memo, mut base) = memo_with(10.0, 20.0);
        base.op = JoinType::RightOuter;
        let err = DefaultCoster::new()
            .estimate_cost(&memo, &RelExpr::InnerJoin(base), &TableStats::new())
            .unwrap_err();
        assert_eq!(
            err,
            CostError::UnhandledJoinType {
                node: "InnerJoin",
                op: JoinType::RightOuter
            }
        );
    }

    #[test]
    fn test_non_injective_lookup_branches() {
        let (memo, base) = memo_with(100.0, 1000.0);
        let index = IndexRef::new("idx", 1, vec![10, 11], false);
        let key = vec![ScalarExpr::col(1, 0, "a.x")];
        let lookup = Lookup::new(index, key, vec![false]);
        // sel = 0.5 * 0.1; L*R*sel = 5000 >= L
        let expected = 100.0 + 100.0 * 1000.0 * 0.05 * 2.01;
        let got = cost(&memo, &RelExpr::lookup_join(base, lookup));
        assert!((got - expected).abs() < 1e-6);

        let (memo, base) = memo_with(100.0, 2.0);
        let index = IndexRef::new("idx", 1, vec![10, 11], false);
        let lookup = Lookup::new(index, vec![ScalarExpr::col(1, 0, "a.x")], vec![false]);
        // L*R*sel = 10 < L, half the index covered
        let expected = 100.0 + (100.0 + 1.0 + 0.5) * 2.01;
        let got = cost(&memo, &RelExpr::lookup_join(base, lookup));
        assert!((got - expected).abs() < 1e-6);
    }

    #[test]
    fn test_merge_join_requires_comparer() {
        let (memo, base) = memo_with(10.0, 20.0);
        let index = IndexRef::new("idx", 1, vec![10], false);
        let merge = RelExpr::merge_join(base, index.clone(), index);
        let err = DefaultCoster::new()
            .estimate_cost(&memo, &merge, &TableStats::new())
            .unwrap_err();
        assert!(matches!(err, CostError::MergeJoinExpectsComparer(_)));
    }

    #[test]
    fn test_non_injective_merge() {
        let (memo, base) = memo_with(10.0, 20.0);
        let base = base.with_filters(vec![ScalarExpr::equal(
            ScalarExpr::col(1, 0, "a.x"),
            ScalarExpr::col(10, 1, "b.x"),
        )]);
        let left = IndexRef::new("a_x", 0, vec![1], false);
        let right = IndexRef::new("b_x", 1, vec![10], false);
        let got = cost(&memo, &RelExpr::merge_join(base, left, right));
        let expected = 30.0 + (30.0 + 200.0 * 0.5) * 0.01;
        assert!((got - expected).abs() < EPS);
    }

    #[test]
    fn test_group_id_out_of_range() {
        let memo = Memo::new();
        let base = JoinBase::new(GroupId(2), GroupId(0), GroupId(1), JoinType::Inner);
        let err = DefaultCoster::new()
            .estimate_cost(&memo, &RelExpr::InnerJoin(base), &TableStats::new())
            .unwrap_err();
        assert_eq!(err, CostError::UnknownGroup(GroupId(0)));
    }
}
