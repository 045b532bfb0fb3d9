/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::super::memo::GroupId;
use super::super::scalar::ScalarExpr;
use shared::{ColSet, ColumnId, TableId};
use std::fmt;

/// Logical join semantics carried by every join node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Cross,
    LeftOuter,
    RightOuter,
    FullOuter,
    Semi,
    Anti,
    AntiIncludeNulls,
    LateralInner,
    LateralCross,
    LateralLeft,
}

impl JoinType {
    /// Semi and anti joins emit each left row at most once
    pub fn is_partial(&self) -> bool {
        matches!(self, JoinType::Semi | JoinType::Anti | JoinType::AntiIncludeNulls)
    }

    pub fn is_left_outer(&self) -> bool {
        matches!(self, JoinType::LeftOuter | JoinType::LateralLeft)
    }

    pub fn is_lateral(&self) -> bool {
        matches!(
            self,
            JoinType::LateralInner | JoinType::LateralCross | JoinType::LateralLeft
        )
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Fields shared by every join operator
#[derive(Debug, Clone, PartialEq)]
pub struct JoinBase {
    /// Group the join itself belongs to
    pub group: GroupId,
    pub left: GroupId,
    pub right: GroupId,
    pub op: JoinType,
    pub filters: Vec<ScalarExpr>,
}

impl JoinBase {
    pub fn new(group: GroupId, left: GroupId, right: GroupId, op: JoinType) -> Self {
        Self {
            group,
            left,
            right,
            op,
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<ScalarExpr>) -> Self {
        self.filters = filters;
        self
    }
}

/// An index on a base table as seen by the planner
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRef {
    pub id: String,
    pub table: TableId,
    /// Indexed columns, in index order
    pub cols: Vec<ColumnId>,
    pub unique: bool,
}

impl IndexRef {
    pub fn new(id: impl Into<String>, table: TableId, cols: Vec<ColumnId>, unique: bool) -> Self {
        Self {
            id: id.into(),
            table,
            cols,
            unique,
        }
    }

    pub fn col_set(&self) -> ColSet {
        self.cols.iter().copied().collect()
    }
}

/// Index lookup performed for every row of the left input
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub index: IndexRef,
    /// Key expression bound to each leading index column
    pub key_exprs: Vec<ScalarExpr>,
    /// Per key position: true when the comparison admits NULL keys
    pub nullmask: Vec<bool>,
}

impl Lookup {
    pub fn new(index: IndexRef, key_exprs: Vec<ScalarExpr>, nullmask: Vec<bool>) -> Self {
        Self {
            index,
            key_exprs,
            nullmask,
        }
    }
}

/// Range containment join driven by a min heap over the right input
#[derive(Debug, Clone, PartialEq)]
pub struct RangeHeap {
    pub value_col: ScalarExpr,
    pub min_col: ScalarExpr,
    pub max_col: ScalarExpr,
}

/// Physical operators placed in memo groups.
///
/// Children are referenced by group, never owned, so shared subexpressions
/// are priced once.
#[derive(Debug, Clone, PartialEq)]
pub enum RelExpr {
    TableScan {
        database: String,
        table: String,
        table_id: TableId,
    },
    Project {
        child: GroupId,
        projections: Vec<ScalarExpr>,
    },
    Distinct {
        child: GroupId,
    },
    Filter {
        child: GroupId,
        filters: Vec<ScalarExpr>,
    },
    /// Nested loop join
    InnerJoin(JoinBase),
    HashJoin {
        base: JoinBase,
        left_attrs: Vec<ScalarExpr>,
        right_attrs: Vec<ScalarExpr>,
    },
    MergeJoin {
        base: JoinBase,
        left_index: IndexRef,
        right_index: IndexRef,
    },
    LookupJoin {
        base: JoinBase,
        lookup: Lookup,
    },
    /// Union of several lookups into the right input
    ConcatJoin {
        base: JoinBase,
        concat: Vec<Lookup>,
    },
    RangeHeapJoin {
        base: JoinBase,
        range_heap: RangeHeap,
    },
    AntiJoin(JoinBase),
    SemiJoin(JoinBase),
    LeftOuterJoin(JoinBase),
    FullOuterJoin(JoinBase),
    LateralJoin(JoinBase),
    /// Join without a usable predicate, executed as a cartesian product
    DegenerateJoin(JoinBase),
    PartialJoin(JoinBase),
}

impl RelExpr {
    pub fn table_scan(database: impl Into<String>, table: impl Into<String>, table_id: TableId) -> Self {
        Self::TableScan {
            database: database.into(),
            table: table.into(),
            table_id,
        }
    }

    pub fn lookup_join(base: JoinBase, lookup: Lookup) -> Self {
        Self::LookupJoin { base, lookup }
    }

    pub fn hash_join(base: JoinBase, left_attrs: Vec<ScalarExpr>, right_attrs: Vec<ScalarExpr>) -> Self {
        Self::HashJoin {
            base,
            left_attrs,
            right_attrs,
        }
    }

    pub fn merge_join(base: JoinBase, left_index: IndexRef, right_index: IndexRef) -> Self {
        Self::MergeJoin {
            base,
            left_index,
            right_index,
        }
    }

    /// Operator name used in error messages and plan output
    pub fn name(&self) -> &'static str {
        match self {
            RelExpr::TableScan { .. } => "TableScan",
            RelExpr::Project { .. } => "Project",
            RelExpr::Distinct { .. } => "Distinct",
            RelExpr::Filter { .. } => "Filter",
            RelExpr::InnerJoin(_) => "InnerJoin",
            RelExpr::HashJoin { .. } => "HashJoin",
            RelExpr::MergeJoin { .. } => "MergeJoin",
            RelExpr::LookupJoin { .. } => "LookupJoin",
            RelExpr::ConcatJoin { .. } => "ConcatJoin",
            RelExpr::RangeHeapJoin { .. } => "RangeHeapJoin",
            RelExpr::AntiJoin(_) => "AntiJoin",
            RelExpr::SemiJoin(_) => "SemiJoin",
            RelExpr::LeftOuterJoin(_) => "LeftOuterJoin",
            RelExpr::FullOuterJoin(_) => "FullOuterJoin",
            RelExpr::LateralJoin(_) => "LateralJoin",
            RelExpr::DegenerateJoin(_) => "DegenerateJoin",
            RelExpr::PartialJoin(_) => "PartialJoin",
        }
    }

    /// Join fields, when the operator is a join
    pub fn join_base(&self) -> Option<&JoinBase> {
        match self {
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
            | RelExpr::RangeHeapJoin { base, .. } => Some(base),
            RelExpr::TableScan { .. }
            | RelExpr::Project { .. }
            | RelExpr::Distinct { .. }
            | RelExpr::Filter { .. } => None,
        }
    }

    pub fn join_base_mut(&mut self) -> Option<&mut JoinBase> {
        match self {
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
            | RelExpr::RangeHeapJoin { base, .. } => Some(base),
            _ => None,
        }
    }

    /// Groups this operator reads from
    pub fn children(&self) -> Vec<GroupId> {
        match self {
            RelExpr::TableScan { .. } => Vec::new(),
            RelExpr::Project { child, .. }
            | RelExpr::Distinct { child }
            | RelExpr::Filter { child, .. } => vec![*child],
            _ => self
                .join_base()
                .map(|base| vec![base.left, base.right])
                .unwrap_or_default(),
        }
    }

    /// Join types a physical join operator knows how to execute. Anything
    /// else reaching the coster is a missing cost rule.
    pub fn supports_join_type(&self, op: JoinType) -> bool {
        use JoinType::*;
        match self {
            RelExpr::InnerJoin(_) => matches!(op, Inner | Cross),
            RelExpr::DegenerateJoin(_) => matches!(op, Inner | Cross),
            RelExpr::LateralJoin(_) => op.is_lateral(),
            RelExpr::LeftOuterJoin(_) => op == LeftOuter,
            RelExpr::FullOuterJoin(_) => op == FullOuter,
            RelExpr::SemiJoin(_) => op == Semi,
            RelExpr::AntiJoin(_) => matches!(op, Anti | AntiIncludeNulls),
            RelExpr::PartialJoin(_) => op.is_partial(),
            RelExpr::HashJoin { .. } => matches!(op, Inner | LeftOuter) || op.is_partial(),
            RelExpr::MergeJoin { .. } | RelExpr::LookupJoin { .. } => {
                matches!(op, Inner | LeftOuter | Semi | Anti)
            }
            RelExpr::ConcatJoin { .. } | RelExpr::RangeHeapJoin { .. } => {
                matches!(op, Inner | LeftOuter)
            }
            RelExpr::TableScan { .. }
            | RelExpr::Project { .. }
            | RelExpr::Distinct { .. }
            | RelExpr::Filter { .. } => false,
        }
    }
}

impl fmt::Display for RelExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelExpr::TableScan {
                database, table, ..
            } => write!(f, "TableScan({}.{})", database, table),
            RelExpr::Project { child, .. } | RelExpr::Distinct { child } | RelExpr::Filter { child, .. } => {
                write!(f, "{}(#{})", self.name(), child)
            }
            RelExpr::LookupJoin { base, lookup } => write!(
                f,
                "LookupJoin[{}](#{} #{}, index={})",
                base.op, base.left, base.right, lookup.index.id
            ),
            _ => match self.join_base() {
                Some(base) => write!(f, "{}[{}](#{} #{})", self.name(), base.op, base.left, base.right),
                None => write!(f, "{}", self.name()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(op: JoinType) -> JoinBase {
        JoinBase::new(GroupId(2), GroupId(0), GroupId(1), op)
    }

    #[test]
    fn test_children_of_joins_and_unary_operators() {
        let join = RelExpr::InnerJoin(base(JoinType::Inner));
        assert_eq!(join.children(), vec![GroupId(0), GroupId(1)]);

        let filter = RelExpr::Filter {
            child: GroupId(4),
            filters: vec![],
        };
        assert_eq!(filter.children(), vec![GroupId(4)]);
        assert!(RelExpr::table_scan("db", "t", 0).children().is_empty());
    }

    #[test]
    fn test_right_outer_is_never_supported() {
        let candidates = vec![
            RelExpr::InnerJoin(base(JoinType::RightOuter)),
            RelExpr::LeftOuterJoin(base(JoinType::RightOuter)),
            RelExpr::hash_join(base(JoinType::RightOuter), vec![], vec![]),
        ];
        for rel in candidates {
            assert!(!rel.supports_join_type(JoinType::RightOuter), "{}", rel.name());
        }
    }

    #[test]
    fn test_hash_join_supports_partial_ops() {
        let rel = RelExpr::hash_join(base(JoinType::Semi), vec![], vec![]);
        assert!(rel.supports_join_type(JoinType::Semi));
        assert!(rel.supports_join_type(JoinType::AntiIncludeNulls));
        assert!(!rel.supports_join_type(JoinType::FullOuter));
    }

    #[test]
    fn test_display() {
        let rel = RelExpr::AntiJoin(base(JoinType::Anti));
        assert_eq!(rel.to_string(), "AntiJoin[Anti](#0 #1)");
    }
}
