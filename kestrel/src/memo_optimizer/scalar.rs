/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use shared::{ColSet, ColumnId, TableId, TableSet};
use std::fmt;

/// Comparison operators other than equality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
}

impl CompareOp {
    fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Ne => "!=",
        }
    }
}

/// Scalar expressions used in join filters and lookup keys
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr {
    ColRef {
        col: ColumnId,
        table: TableId,
        name: String,
    },
    Literal(String),
    Null,
    Equal(Box<ScalarExpr>, Box<ScalarExpr>),
    /// `<=>`, true when both sides are NULL
    NullSafeEqual(Box<ScalarExpr>, Box<ScalarExpr>),
    Compare {
        op: CompareOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },
    And(Box<ScalarExpr>, Box<ScalarExpr>),
    Or(Box<ScalarExpr>, Box<ScalarExpr>),
    Not(Box<ScalarExpr>),
    IsNull(Box<ScalarExpr>),
    Tuple(Vec<ScalarExpr>),
    Func {
        name: String,
        args: Vec<ScalarExpr>,
    },
}

/// Properties derived from a scalar expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarProps {
    /// Columns referenced anywhere in the expression
    pub cols: ColSet,
    /// Tables owning those columns
    pub tables: TableSet,
    /// The expression evaluates to NULL whenever a referenced column is NULL
    pub null_rejecting: bool,
}

/// Functions that can turn a NULL argument into a non-NULL result
const NULL_TOLERANT_FUNCS: &[&str] = &["coalesce", "ifnull", "nullif", "isnull", "if"];

impl ScalarExpr {
    pub fn col(col: ColumnId, table: TableId, name: impl Into<String>) -> Self {
        Self::ColRef {
            col,
            table,
            name: name.into(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn equal(left: ScalarExpr, right: ScalarExpr) -> Self {
        Self::Equal(Box::new(left), Box::new(right))
    }

    pub fn null_safe_eq(left: ScalarExpr, right: ScalarExpr) -> Self {
        Self::NullSafeEqual(Box::new(left), Box::new(right))
    }

    pub fn compare(op: CompareOp, left: ScalarExpr, right: ScalarExpr) -> Self {
        Self::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn func(name: impl Into<String>, args: Vec<ScalarExpr>) -> Self {
        Self::Func {
            name: name.into(),
            args,
        }
    }

    /// Returns the column id when the expression is a bare column reference
    pub fn as_col(&self) -> Option<ColumnId> {
        match self {
            ScalarExpr::ColRef { col, .. } => Some(*col),
            _ => None,
        }
    }

    pub fn props(&self) -> ScalarProps {
        let mut props = ScalarProps {
            null_rejecting: self.is_null_rejecting(),
            ..ScalarProps::default()
        };
        self.collect_refs(&mut props.cols, &mut props.tables);
        props
    }

    fn collect_refs(&self, cols: &mut ColSet, tables: &mut TableSet) {
        match self {
            ScalarExpr::ColRef { col, table, .. } => {
                cols.add(*col);
                tables.add(*table);
            }
            ScalarExpr::Literal(_) | ScalarExpr::Null => {}
            ScalarExpr::Equal(l, r)
            | ScalarExpr::NullSafeEqual(l, r)
            | ScalarExpr::And(l, r)
            | ScalarExpr::Or(l, r)
            | ScalarExpr::Compare {
                left: l, right: r, ..
            } => {
                l.collect_refs(cols, tables);
                r.collect_refs(cols, tables);
            }
            ScalarExpr::Not(e) | ScalarExpr::IsNull(e) => e.collect_refs(cols, tables),
            ScalarExpr::Tuple(items) | ScalarExpr::Func { args: items, .. } => {
                for item in items {
                    item.collect_refs(cols, tables);
                }
            }
        }
    }

    fn is_null_rejecting(&self) -> bool {
        match self {
            ScalarExpr::ColRef { .. } | ScalarExpr::Literal(_) => true,
            ScalarExpr::Null => false,
            ScalarExpr::NullSafeEqual(..) | ScalarExpr::IsNull(_) | ScalarExpr::Or(..) => false,
            ScalarExpr::Equal(l, r) | ScalarExpr::And(l, r) => {
                l.is_null_rejecting() && r.is_null_rejecting()
            }
            ScalarExpr::Compare { left, right, .. } => {
                left.is_null_rejecting() && right.is_null_rejecting()
            }
            ScalarExpr::Not(e) => e.is_null_rejecting(),
            ScalarExpr::Tuple(items) => items.iter().all(ScalarExpr::is_null_rejecting),
            ScalarExpr::Func { name, args } => {
                !NULL_TOLERANT_FUNCS.contains(&name.to_lowercase().as_str())
                    && args.iter().all(ScalarExpr::is_null_rejecting)
            }
        }
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::ColRef { name, .. } => write!(f, "{}", name),
            ScalarExpr::Literal(v) => write!(f, "{}", v),
            ScalarExpr::Null => write!(f, "NULL"),
            ScalarExpr::Equal(l, r) => write!(f, "({} = {})", l, r),
            ScalarExpr::NullSafeEqual(l, r) => write!(f, "({} <=> {})", l, r),
            ScalarExpr::Compare { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }
            ScalarExpr::And(l, r) => write!(f, "({} AND {})", l, r),
            ScalarExpr::Or(l, r) => write!(f, "({} OR {})", l, r),
            ScalarExpr::Not(e) => write!(f, "NOT {}", e),
            ScalarExpr::IsNull(e) => write!(f, "{} IS NULL", e),
            ScalarExpr::Tuple(items) => write_list(f, "", items),
            ScalarExpr::Func { name, args } => write_list(f, name, args),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, prefix: &str, items: &[ScalarExpr]) -> fmt::Result {
    write!(f, "{}(", prefix)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_collect_columns_and_tables() {
        let expr = ScalarExpr::func(
            "abs",
            vec![ScalarExpr::col(1, 0, "a.x"), ScalarExpr::col(5, 2, "b.y")],
        );
        let props = expr.props();
        assert_eq!(props.cols, [1, 5].into_iter().collect::<ColSet>());
        assert_eq!(props.tables, [0, 2].into_iter().collect::<TableSet>());
        assert!(props.null_rejecting);
    }

    #[test]
    fn test_null_tolerant_expressions() {
        let coalesce = ScalarExpr::func(
            "COALESCE",
            vec![ScalarExpr::col(1, 0, "a.x"), ScalarExpr::literal("0")],
        );
        assert!(!coalesce.props().null_rejecting);
        assert!(!ScalarExpr::Null.props().null_rejecting);
        assert!(!ScalarExpr::IsNull(Box::new(ScalarExpr::col(1, 0, "a.x")))
            .props()
            .null_rejecting);
    }

    #[test]
    fn test_display() {
        let expr = ScalarExpr::equal(
            ScalarExpr::Tuple(vec![ScalarExpr::col(1, 0, "a.x"), ScalarExpr::col(2, 0, "a.y")]),
            ScalarExpr::Tuple(vec![ScalarExpr::col(3, 1, "b.x"), ScalarExpr::literal("1")]),
        );
        assert_eq!(expr.to_string(), "((a.x, a.y) = (b.x, 1))");
    }
}
