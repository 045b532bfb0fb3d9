/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a column produced somewhere in a plan
pub type ColumnId = u16;

/// Identifier of a base table referenced by a plan
pub type TableId = u16;

const WORD_BITS: usize = 64;

/// Dense bitset over small integer ids.
///
/// Trailing zero words are always trimmed, so two sets holding the same ids
/// compare equal regardless of the operations that produced them.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdSet {
    words: Vec<u64>,
}

/// Set of column ids
pub type ColSet = IdSet;

/// Set of table ids
pub type TableSet = IdSet;

impl IdSet {
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates a set holding a single id
    pub fn single(id: u16) -> Self {
        let mut set = Self::new();
        set.add(id);
        set
    }

    pub fn add(&mut self, id: u16) {
        let (word, bit) = Self::position(id);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << bit;
    }

    pub fn remove(&mut self, id: u16) {
        let (word, bit) = Self::position(id);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !(1u64 << bit);
        }
        self.trim();
    }

    pub fn contains(&self, id: u16) -> bool {
        let (word, bit) = Self::position(id);
        self.words.get(word).map_or(false, |w| w & (1u64 << bit) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn union(&self, other: &IdSet) -> IdSet {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    pub fn union_with(&mut self, other: &IdSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    pub fn intersection(&self, other: &IdSet) -> IdSet {
        let mut out = IdSet {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
        };
        out.trim();
        out
    }

    pub fn difference(&self, other: &IdSet) -> IdSet {
        let mut out = self.clone();
        for (w, o) in out.words.iter_mut().zip(&other.words) {
            *w &= !o;
        }
        out.trim();
        out
    }

    pub fn intersects(&self, other: &IdSet) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    /// Returns true when every id of `self` is also in `other`
    pub fn subset_of(&self, other: &IdSet) -> bool {
        self.words.iter().enumerate().all(|(i, w)| {
            let o = other.words.get(i).copied().unwrap_or(0);
            w & !o == 0
        })
    }

    /// Iterates the ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1u64 << *bit) != 0)
                .map(move |bit| (i * WORD_BITS + bit) as u16)
        })
    }

    fn position(id: u16) -> (usize, usize) {
        let id = id as usize;
        (id / WORD_BITS, id % WORD_BITS)
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl FromIterator<u16> for IdSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut set = IdSet::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}

impl fmt::Debug for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, ")")
    }
}
