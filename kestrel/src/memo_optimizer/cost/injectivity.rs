/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Detection of index probes that can return at most one row

use super::super::errors::{CostError, CostResult};
use super::super::memo::Memo;
use super::super::operators::{IndexRef, JoinBase, Lookup};
use super::super::scalar::ScalarExpr;
use super::constants::CostModel;
use shared::{ColSet, ColumnId, FuncDepSet, TableId};

/// Returns true when probing `index` with `key_exprs` yields at most one row.
///
/// Each key position holds a value that is constant from the probed side,
/// so every column equivalent to a key expression becomes constant. Only
/// positions that are non-nullable and whose expression rejects NULL also
/// make those columns not-null.
pub fn is_injective_lookup(
    index: &IndexRef,
    join_fds: &FuncDepSet,
    probed_fds: &FuncDepSet,
    key_exprs: &[ScalarExpr],
    nullmask: &[bool],
) -> bool {
    if !index.unique {
        return false;
    }

    let mut not_null = ColSet::new();
    let mut const_cols = ColSet::new();
    for (i, key) in key_exprs.iter().enumerate() {
        let props = key.props();
        let on_cols = join_fds.equivalence_closure(&props.cols);
        let nullable = nullmask.get(i).copied().unwrap_or(true);
        if !nullable && props.null_rejecting {
            not_null.union_with(&on_cols);
        }
        const_cols.union_with(&on_cols);
    }

    let index_cols = index.col_set();
    let mut fds = FuncDepSet::for_lookup(
        probed_fds,
        &index_cols,
        &not_null,
        &const_cols,
        join_fds.equiv(),
    );
    fds.add_lax_key(&index_cols);
    fds.has_max1_row()
}

/// Selectivity of a lookup that may return several rows; zero when the
/// lookup is injective.
pub fn lookup_join_selectivity(
    model: &CostModel,
    memo: &Memo,
    base: &JoinBase,
    lookup: &Lookup,
) -> CostResult<f64> {
    let join_fds = memo.fds(base.group)?;
    let probed_fds = memo.fds(base.right)?;
    if is_injective_lookup(
        &lookup.index,
        join_fds,
        probed_fds,
        &lookup.key_exprs,
        &lookup.nullmask,
    ) {
        return Ok(0.0);
    }
    Ok(key_selectivity(model, lookup.key_exprs.len()) * model.optimistic_join_sel)
}

/// Selectivity reduction contributed by `keys` equality keys
pub fn key_selectivity(model: &CostModel, keys: usize) -> f64 {
    model.per_key_cost_reduction_factor.powi(keys as i32)
}

/// Splits the first filter of a merge join into its compared expressions.
/// The filter must be an equality, either of two scalars or of two tuples.
pub fn merge_comparison(base: &JoinBase) -> CostResult<(Vec<ScalarExpr>, Vec<ScalarExpr>)> {
    let Some(first) = base.filters.first() else {
        return Err(CostError::MergeJoinExpectsComparer("no filter".to_string()));
    };
    match first {
        ScalarExpr::Equal(left, right) => Ok((flatten_tuple(left), flatten_tuple(right))),
        other => Err(CostError::MergeJoinExpectsComparer(other.to_string())),
    }
}

fn flatten_tuple(expr: &ScalarExpr) -> Vec<ScalarExpr> {
    match expr {
        ScalarExpr::Tuple(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Key expressions bound to the leading columns of an index on `table`,
/// taken from a pairwise comparison `left_exprs[i] = right_exprs[i]`.
///
/// For each index column in order, the comparison side opposite the first
/// pair mentioning that column becomes its key. A key that itself reads
/// from `table` is not usable, and later pairs are tried instead. Matching
/// stops at the first column with no usable key.
pub fn key_exprs_for_index_from_tuple_comparison(
    table: TableId,
    idx_cols: &[ColumnId],
    left_exprs: &[ScalarExpr],
    right_exprs: &[ScalarExpr],
) -> Option<Vec<ScalarExpr>> {
    let refers_to = |expr: &ScalarExpr, col: ColumnId| {
        matches!(expr, ScalarExpr::ColRef { col: c, table: t, .. } if *c == col && *t == table)
    };

    let mut keys = Vec::new();
    for &col in idx_cols {
        let key = left_exprs
            .iter()
            .zip(right_exprs)
            .filter_map(|(l, r)| {
                if refers_to(l, col) {
                    Some(r)
                } else if refers_to(r, col) {
                    Some(l)
                } else {
                    None
                }
            })
            .find(|key| !key.props().tables.contains(table));
        match key {
            Some(key) => keys.push(key.clone()),
            None => break,
        }
    }
    if keys.is_empty() {
        None
    } else {
        Some(keys)
    }
}

/// Returns true when either side of a merge join reads through a unique
/// index fully bound by the merge comparison
pub fn is_injective_merge(
    memo: &Memo,
    base: &JoinBase,
    left_index: &IndexRef,
    right_index: &IndexRef,
    left_exprs: &[ScalarExpr],
    right_exprs: &[ScalarExpr],
) -> CostResult<bool> {
    let join_fds = memo.fds(base.group)?;
    for (index, probed) in [(left_index, base.left), (right_index, base.right)] {
        let Some(keys) = key_exprs_for_index_from_tuple_comparison(
            index.table,
            &index.cols,
            left_exprs,
            right_exprs,
        ) else {
            continue;
        };
        let nullmask = vec![false; keys.len()];
        if is_injective_lookup(index, join_fds, memo.fds(probed)?, &keys, &nullmask) {
            return Ok(true);
        }
    }
    Ok(false)
}
