/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Functional dependencies over the columns of a relation.
//!
//! A `FuncDepSet` tracks four kinds of facts:
//!
//! - not-null columns
//! - constant columns (a single value for every row)
//! - equivalence classes (columns known to hold equal values)
//! - keys: a strict key determines at most one row, a lax key does so only
//!   among rows whose key columns are all non-null
//!
//! The planner only asks two questions of a set: which columns are equal to
//! a given set (`equivalence_closure`) and whether the relation can produce
//! more than one row (`has_max1_row`).

use crate::col_set::ColSet;
use serde::{Deserialize, Serialize};

/// Disjoint classes of columns known to be equal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivSets {
    sets: Vec<ColSet>,
}

impl EquivSets {
    pub fn new() -> Self {
        Self { sets: Vec::new() }
    }

    /// Adds a class, merging every existing class it overlaps
    pub fn add(&mut self, cols: &ColSet) {
        if cols.len() < 2 {
            return;
        }
        let mut merged = cols.clone();
        self.sets.retain(|set| {
            if set.intersects(&merged) {
                merged.union_with(set);
                false
            } else {
                true
            }
        });
        // a class absorbed late can bridge classes retained earlier
        while let Some(pos) = self.sets.iter().position(|set| set.intersects(&merged)) {
            let set = self.sets.swap_remove(pos);
            merged.union_with(&set);
        }
        self.sets.push(merged);
    }

    /// Records that two columns are equal
    pub fn add_pair(&mut self, a: u16, b: u16) {
        if a != b {
            self.add(&[a, b].into_iter().collect());
        }
    }

    pub fn sets(&self) -> &[ColSet] {
        &self.sets
    }

    pub fn closure(&self, cols: &ColSet) -> ColSet {
        let mut out = cols.clone();
        for set in &self.sets {
            if set.intersects(cols) {
                out.union_with(set);
            }
        }
        out
    }
}

/// A set of columns that functionally determines a whole row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub cols: ColSet,
    pub strict: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuncDepSet {
    all: ColSet,
    not_null: ColSet,
    consts: ColSet,
    equiv: EquivSets,
    keys: Vec<Key>,
}

impl FuncDepSet {
    /// Creates an empty dependency set over the given output columns
    pub fn new(all: ColSet) -> Self {
        Self {
            all,
            ..Self::default()
        }
    }

    /// Dependency set of a base table: its not-null columns plus one key
    /// per unique index (or primary key)
    pub fn for_table(all: ColSet, not_null: ColSet, unique_keys: &[ColSet]) -> Self {
        let mut fds = Self::new(all);
        fds.add_not_nullable(&not_null);
        for key in unique_keys {
            fds.add_lax_key(key);
        }
        fds
    }

    /// Dependency set seen from the probed side of an index lookup.
    ///
    /// Starts from the probed relation's own dependencies, adds the columns
    /// the lookup proves not-null, the columns the lookup holds constant,
    /// and the equivalences of the enclosing join.
    pub fn for_lookup(
        probed: &FuncDepSet,
        index_cols: &ColSet,
        not_null: &ColSet,
        const_cols: &ColSet,
        equiv: &EquivSets,
    ) -> Self {
        let mut fds = Self::new(probed.all.union(index_cols));
        fds.add_not_nullable(&probed.not_null);
        fds.add_not_nullable(not_null);
        fds.add_constants(&probed.consts);
        fds.add_constants(const_cols);
        for set in probed.equiv.sets().iter().chain(equiv.sets()) {
            fds.add_equiv_set(set);
        }
        for key in &probed.keys {
            if key.strict {
                fds.add_strict_key(&key.cols);
            } else {
                fds.add_lax_key(&key.cols);
            }
        }
        fds
    }

    /// Combines the dependencies of both inputs of an inner join. Join
    /// equalities must be added afterwards with `add_equiv_set`.
    pub fn inner_join(left: &FuncDepSet, right: &FuncDepSet) -> Self {
        let mut fds = Self::new(left.all.union(&right.all));
        fds.add_not_nullable(&left.not_null);
        fds.add_not_nullable(&right.not_null);
        fds.add_constants(&left.consts);
        fds.add_constants(&right.consts);
        for set in left.equiv.sets().iter().chain(right.equiv.sets()) {
            fds.add_equiv_set(set);
        }
        for l in &left.keys {
            for r in &right.keys {
                let cols = l.cols.union(&r.cols);
                if l.strict && r.strict {
                    fds.add_strict_key(&cols);
                } else {
                    fds.add_lax_key(&cols);
                }
            }
        }
        fds
    }

    pub fn all(&self) -> &ColSet {
        &self.all
    }

    pub fn not_null(&self) -> &ColSet {
        &self.not_null
    }

    pub fn constants(&self) -> &ColSet {
        &self.consts
    }

    pub fn equiv(&self) -> &EquivSets {
        &self.equiv
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn add_not_nullable(&mut self, cols: &ColSet) {
        self.not_null.union_with(cols);
    }

    pub fn add_constants(&mut self, cols: &ColSet) {
        self.consts.union_with(cols);
    }

    pub fn add_equiv_set(&mut self, cols: &ColSet) {
        self.equiv.add(cols);
    }

    pub fn add_strict_key(&mut self, cols: &ColSet) {
        self.push_key(Key {
            cols: cols.clone(),
            strict: true,
        });
    }

    /// Adds a key that only holds for non-null values. A lax key over
    /// not-null columns is recorded as strict.
    pub fn add_lax_key(&mut self, cols: &ColSet) {
        let strict = cols.subset_of(&self.not_null);
        self.push_key(Key {
            cols: cols.clone(),
            strict,
        });
    }

    /// Returns `cols` extended with every column equivalent to one of them
    pub fn equivalence_closure(&self, cols: &ColSet) -> ColSet {
        self.equiv.closure(cols)
    }

    /// Returns true when the relation is guaranteed to produce at most one
    /// row: some key is strict (directly or because its columns are
    /// not-null) and every key column is constant, directly or through an
    /// equivalence with a constant column.
    pub fn has_max1_row(&self) -> bool {
        let consts = self.equivalence_closure(&self.consts);
        self.keys.iter().any(|key| {
            let strict = key.strict || key.cols.subset_of(&self.not_null);
            strict && key.cols.subset_of(&consts)
        })
    }

    fn push_key(&mut self, key: Key) {
        if key.cols.is_empty() && !key.strict {
            return;
        }
        if self
            .keys
            .iter()
            .any(|k| k.cols.subset_of(&key.cols) && (k.strict || !key.strict))
        {
            return;
        }
        self.keys
            .retain(|k| !(key.cols.subset_of(&k.cols) && (key.strict || !k.strict)));
        self.keys.push(key);
        self.keys.sort_by(|a, b| {
            b.strict
                .cmp(&a.strict)
                .then_with(|| a.cols.len().cmp(&b.cols.len()))
        });
    }
}
