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
use super::super::operators::RelExpr;
use super::super::stats::StatsProvider;
use super::constants::CostConstants;
use super::estimator::{Coster, DefaultCoster};

/// Operator family a biased coster forces the search towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bias {
    Inner,
    Hash,
    /// Lookup and concatenated lookup joins
    Lookup,
    Merge,
    /// Anti, semi and partial joins
    Partial,
    RangeHeap,
}

impl Bias {
    pub const ALL: [Bias; 6] = [
        Bias::Inner,
        Bias::Hash,
        Bias::Lookup,
        Bias::Merge,
        Bias::Partial,
        Bias::RangeHeap,
    ];

    pub fn favors(&self, node: &RelExpr) -> bool {
        match self {
            Bias::Inner => matches!(node, RelExpr::InnerJoin(_)),
            Bias::Hash => matches!(node, RelExpr::HashJoin { .. }),
            Bias::Lookup => matches!(node, RelExpr::LookupJoin { .. } | RelExpr::ConcatJoin { .. }),
            Bias::Merge => matches!(node, RelExpr::MergeJoin { .. }),
            Bias::Partial => matches!(
                node,
                RelExpr::AntiJoin(_) | RelExpr::SemiJoin(_) | RelExpr::PartialJoin(_)
            ),
            Bias::RangeHeap => matches!(node, RelExpr::RangeHeapJoin { .. }),
        }
    }
}

/// Wraps a coster so that one operator family always wins.
///
/// Favored operators cost `-bias_factor`; everything else is priced by the
/// wrapped coster. Costs from differently biased passes must not be
/// compared with each other.
#[derive(Debug, Clone)]
pub struct BiasedCoster<C = DefaultCoster> {
    base: C,
    bias: Bias,
    bias_factor: f64,
}

impl<C: Coster> BiasedCoster<C> {
    pub fn new(base: C, bias: Bias) -> Self {
        Self {
            base,
            bias,
            bias_factor: CostConstants::BIAS_FACTOR,
        }
    }

    pub fn with_bias_factor(mut self, bias_factor: f64) -> Self {
        self.bias_factor = bias_factor;
        self
    }

    pub fn bias(&self) -> Bias {
        self.bias
    }
}

impl<C: Coster> Coster for BiasedCoster<C> {
    fn estimate_cost(
        &self,
        memo: &Memo,
        node: &RelExpr,
        stats: &dyn StatsProvider,
    ) -> CostResult<f64> {
        if self.bias.favors(node) {
            return Ok(-self.bias_factor);
        }
        self.base.estimate_cost(memo, node, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo_optimizer::memo::GroupId;
    use crate::memo_optimizer::operators::{JoinBase, JoinType};
    use crate::memo_optimizer::stats::TableStats;

    #[test]
    fn test_favored_kind_costs_negative_bias() {
        let mut memo = Memo::new();
        let a = memo.add_scan("db", "a", 0);
        let b = memo.add_scan("db", "b", 1);
        let join = memo.new_group();
        let base = JoinBase::new(join, a, b, JoinType::Semi);
        let stats = TableStats::new();

        let coster = BiasedCoster::new(DefaultCoster::new(), Bias::Partial);
        for node in [RelExpr::SemiJoin(base.clone()), RelExpr::PartialJoin(base.clone())] {
            assert_eq!(coster.estimate_cost(&memo, &node, &stats).unwrap(), -1e5);
        }

        let hash = RelExpr::hash_join(base, vec![], vec![]);
        assert_eq!(
            coster.estimate_cost(&memo, &hash, &stats).unwrap(),
            DefaultCoster::new().estimate_cost(&memo, &hash, &stats).unwrap()
        );
    }

    #[test]
    fn test_custom_bias_factor() {
        let memo = Memo::new();
        let coster = BiasedCoster::new(DefaultCoster::new(), Bias::Inner).with_bias_factor(7.0);
        let base = JoinBase::new(GroupId(2), GroupId(0), GroupId(1), JoinType::RightOuter);
        // favored kinds short-circuit before any validation
        let cost = coster
            .estimate_cost(&memo, &RelExpr::InnerJoin(base), &TableStats::new())
            .unwrap();
        assert_eq!(cost, -7.0);
    }
}
