/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::driver::{Database, Index, IndexDriver};
use super::errors::{RegistryError, RegistryResult};
use super::signal::{CompletionSignal, DeleteSignal, IndexBuild, ReadySignal, RetainedIndex};
use super::status::IndexStatus;
use crossbeam::channel::{bounded, Sender};
use log::{debug, error, warn};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Case-insensitive (database, index id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    database: String,
    id: String,
}

impl IndexKey {
    pub fn new(database: &str, id: &str) -> Self {
        Self {
            database: database.to_lowercase(),
            id: id.to_lowercase(),
        }
    }

    fn of(index: &dyn Index) -> Self {
        Self::new(index.database(), index.id())
    }
}

struct Entry {
    index: Arc<dyn Index>,
    status: IndexStatus,
    /// Distinguishes this entry from earlier ones registered under the same key
    generation: u64,
    ref_count: usize,
    /// Fired once the last reader releases an index queued for deletion
    pending_delete: Option<Sender<()>>,
}

impl Entry {
    fn usable(&self) -> bool {
        self.status.is_ready() && self.pending_delete.is_none()
    }
}

#[derive(Default)]
struct RegistryState {
    indexes: FxHashMap<IndexKey, Entry>,
    /// Registration order of `indexes`
    order: Vec<IndexKey>,
    next_generation: u64,
}

impl RegistryState {
    fn new_entry(&mut self, index: Arc<dyn Index>, status: IndexStatus) -> Entry {
        self.next_generation += 1;
        Entry {
            index,
            status,
            generation: self.next_generation,
            ref_count: 0,
            pending_delete: None,
        }
    }

    fn insert(&mut self, key: IndexKey, entry: Entry) {
        self.indexes.insert(key.clone(), entry);
        self.order.push(key);
    }

    fn remove(&mut self, key: &IndexKey) -> Option<Entry> {
        let entry = self.indexes.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry)
    }

    /// Entries in registration order
    fn ordered(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.order.iter().filter_map(|key| self.indexes.get(key))
    }
}

#[derive(Default)]
struct Inner {
    state: Mutex<RegistryState>,
    drivers: RwLock<BTreeMap<String, Arc<dyn IndexDriver>>>,
}

/// Catalog of the secondary indexes of every database.
///
/// Cloning yields another handle to the same catalog. All bookkeeping sits
/// behind one mutex held only for map updates; builds and deferred deletes
/// complete through one-shot signals outside the lock.
#[derive(Clone, Default)]
pub struct IndexRegistry {
    inner: Arc<Inner>,
}

impl fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("IndexRegistry")
            .field("indexes", &state.order)
            .finish()
    }
}

fn same_expressions(a: &[String], b: &[String]) -> bool {
    let normalize = |exprs: &[String]| {
        let mut out: Vec<String> = exprs.iter().map(|e| e.to_lowercase()).collect();
        out.sort();
        out
    };
    a.len() == b.len() && normalize(a) == normalize(b)
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_index_driver(&self, driver: Arc<dyn IndexDriver>) {
        let mut drivers = self
            .inner
            .drivers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        debug!("registered index driver {}", driver.id());
        drivers.insert(driver.id().to_string(), driver);
    }

    pub fn index_driver(&self, id: &str) -> Option<Arc<dyn IndexDriver>> {
        let drivers = self
            .inner
            .drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        drivers.get(id).cloned()
    }

    /// The registered driver, when exactly one is registered
    pub fn default_index_driver(&self) -> Option<Arc<dyn IndexDriver>> {
        let drivers = self
            .inner
            .drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if drivers.len() == 1 {
            drivers.values().next().cloned()
        } else {
            None
        }
    }

    pub fn has_indexes(&self) -> bool {
        !self.state().indexes.is_empty()
    }

    /// Registers a new index as not ready.
    ///
    /// The returned `IndexBuild` belongs to whoever builds the index and
    /// promotes it when the build completes; the `ReadySignal` fires after
    /// that promotion.
    pub fn add_index(&self, index: Arc<dyn Index>) -> RegistryResult<(IndexBuild, ReadySignal)> {
        let key = IndexKey::of(index.as_ref());
        let mut state = self.state();

        if state.indexes.contains_key(&key) {
            return Err(RegistryError::IndexIdAlreadyRegistered {
                database: index.database().to_string(),
                id: index.id().to_string(),
            });
        }

        let conflict = state.indexes.values().any(|entry| {
            let other = entry.index.as_ref();
            matches!(entry.status, IndexStatus::NotReady | IndexStatus::Ready)
                && entry.pending_delete.is_none()
                && other.database().eq_ignore_ascii_case(index.database())
                && other.table().eq_ignore_ascii_case(index.table())
                && same_expressions(other.expressions(), index.expressions())
        });
        if conflict {
            return Err(RegistryError::IndexExpressionAlreadyRegistered {
                database: index.database().to_string(),
                table: index.table().to_string(),
                expressions: index.expressions().to_vec(),
            });
        }

        debug!(
            "registered index {}.{} on {}, building",
            index.database(),
            index.id(),
            index.table()
        );
        let entry = state.new_entry(index, IndexStatus::NotReady);
        state.insert(key.clone(), entry);
        drop(state);

        let (tx, rx) = bounded(1);
        Ok((
            IndexBuild::new(self.clone(), key, tx),
            CompletionSignal::new(rx),
        ))
    }

    /// Moves a building index to ready. Returns false when the index is
    /// gone, queued for deletion or not building.
    pub(crate) fn promote(&self, key: &IndexKey) -> bool {
        let mut state = self.state();
        match state.indexes.get_mut(key) {
            Some(entry) if entry.status == IndexStatus::NotReady && entry.pending_delete.is_none() => {
                entry.status = IndexStatus::Ready;
                debug!("index {}.{} is ready", key.database, key.id);
                true
            }
            _ => false,
        }
    }

    /// True when the index is ready and not queued for deletion
    pub fn can_use_index(&self, index: &dyn Index) -> bool {
        self.state()
            .indexes
            .get(&IndexKey::of(index))
            .map_or(false, Entry::usable)
    }

    /// True when the index is in a state that allows dropping it
    pub fn can_remove_index(&self, index: &dyn Index) -> bool {
        self.state()
            .indexes
            .get(&IndexKey::of(index))
            .map_or(false, |entry| {
                matches!(entry.status, IndexStatus::Ready | IndexStatus::Outdated)
            })
    }

    pub fn status(&self, database: &str, id: &str) -> Option<IndexStatus> {
        self.state()
            .indexes
            .get(&IndexKey::new(database, id))
            .map(|entry| entry.status)
    }

    /// Number of outstanding retains
    pub fn ref_count(&self, database: &str, id: &str) -> Option<usize> {
        self.state()
            .indexes
            .get(&IndexKey::new(database, id))
            .map(|entry| entry.ref_count)
    }

    /// Looks an index up by id, whatever its status. Does not retain it.
    pub fn index(&self, database: &str, id: &str) -> Option<Arc<dyn Index>> {
        self.state()
            .indexes
            .get(&IndexKey::new(database, id))
            .map(|entry| entry.index.clone())
    }

    /// Every index on a table, in registration order
    pub fn indexes_by_table(&self, database: &str, table: &str) -> Vec<Arc<dyn Index>> {
        self.state()
            .ordered()
            .filter(|entry| {
                entry.index.database().eq_ignore_ascii_case(database)
                    && entry.index.table().eq_ignore_ascii_case(table)
            })
            .map(|entry| entry.index.clone())
            .collect()
    }

    /// Usable index whose expressions equal `exprs`, in any order
    pub fn index_by_expression<E: fmt::Display>(
        &self,
        database: &str,
        exprs: &[E],
    ) -> Option<Arc<dyn Index>> {
        let wanted: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
        let state = self.state();
        let found = state
            .ordered()
            .find(|entry| {
                entry.usable()
                    && entry.index.database().eq_ignore_ascii_case(database)
                    && same_expressions(entry.index.expressions(), &wanted)
            })
            .map(|entry| entry.index.clone());
        found
    }

    /// Usable index sharing the longest leading run of expressions with
    /// `exprs`, and the length of that run. An index matching `exprs`
    /// exactly wins outright; ties go to the earliest registered index.
    pub fn matching_index<E: fmt::Display>(
        &self,
        database: &str,
        exprs: &[E],
    ) -> Option<(Arc<dyn Index>, usize)> {
        let wanted: Vec<String> = exprs.iter().map(|e| e.to_string().to_lowercase()).collect();
        let state = self.state();
        let mut best: Option<(&Entry, usize)> = None;

        for entry in state.ordered() {
            if !entry.usable() || !entry.index.database().eq_ignore_ascii_case(database) {
                continue;
            }
            let idx_exprs = entry.index.expressions();
            let matched = idx_exprs
                .iter()
                .zip(&wanted)
                .take_while(|(ie, e)| ie.to_lowercase() == **e)
                .count();
            if matched == 0 {
                continue;
            }
            if matched == idx_exprs.len() && matched == wanted.len() {
                return Some((entry.index.clone(), matched));
            }
            if best.map_or(true, |(_, n)| matched > n) {
                best = Some((entry, matched));
            }
        }
        best.map(|(entry, n)| (entry.index.clone(), n))
    }

    /// For every usable index of `database` whose expressions all appear in
    /// `exprs`, the supplied expressions it covers in index order. Longest
    /// lists come first; equal lengths keep registration order.
    pub fn expressions_with_indexes<E: fmt::Display + Clone>(
        &self,
        database: &str,
        exprs: &[E],
    ) -> Vec<Vec<E>> {
        let rendered: Vec<String> = exprs.iter().map(|e| e.to_string().to_lowercase()).collect();
        let state = self.state();
        let mut results: Vec<Vec<E>> = Vec::new();

        'indexes: for entry in state.ordered() {
            if !entry.usable() || !entry.index.database().eq_ignore_ascii_case(database) {
                continue;
            }
            let idx_exprs = entry.index.expressions();
            if idx_exprs.len() > exprs.len() {
                continue;
            }
            let mut used = vec![false; exprs.len()];
            let mut matched = Vec::with_capacity(idx_exprs.len());
            for ie in idx_exprs {
                let ie = ie.to_lowercase();
                let found = rendered
                    .iter()
                    .enumerate()
                    .position(|(i, e)| !used[i] && *e == ie);
                match found {
                    Some(i) => {
                        used[i] = true;
                        matched.push(exprs[i].clone());
                    }
                    None => continue 'indexes,
                }
            }
            results.push(matched);
        }
        drop(state);

        results.sort_by(|a, b| b.len().cmp(&a.len()));
        results
    }

    /// Increments the reference count of a usable index and returns the
    /// generation to hand back to `release_index`. Returns `None` when the
    /// index is missing or not usable.
    pub fn retain_index(&self, database: &str, id: &str) -> Option<u64> {
        let mut state = self.state();
        match state.indexes.get_mut(&IndexKey::new(database, id)) {
            Some(entry) if entry.usable() => {
                entry.ref_count += 1;
                Some(entry.generation)
            }
            _ => None,
        }
    }

    /// Drops one reference taken by `retain_index`. Releasing the last
    /// reference of an index queued for deletion removes it and fires its
    /// delete signal.
    ///
    /// A release for an entry that has since been removed is ignored, even
    /// when another index was registered under the same id afterwards.
    pub fn release_index(&self, index: &dyn Index, generation: u64) {
        let key = IndexKey::of(index);
        let mut state = self.state();
        let Some(entry) = state.indexes.get_mut(&key) else {
            return;
        };
        if entry.generation != generation {
            debug!(
                "ignoring release of removed index {}.{}",
                key.database, key.id
            );
            return;
        }
        debug_assert!(
            entry.ref_count > 0,
            "released index {}.{} more often than retained",
            key.database,
            key.id
        );
        if entry.ref_count == 0 {
            error!(
                "reference count of index {}.{} would drop below zero",
                key.database, key.id
            );
            return;
        }

        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return;
        }
        if let Some(tx) = entry.pending_delete.take() {
            state.remove(&key);
            debug!("index {}.{} deleted after last release", key.database, key.id);
            let _ = tx.send(());
        }
    }

    /// Retains a usable index for the lifetime of the returned guard
    pub fn acquire(&self, database: &str, id: &str) -> Option<RetainedIndex> {
        let (index, generation) = {
            let mut state = self.state();
            let entry = state.indexes.get_mut(&IndexKey::new(database, id))?;
            if !entry.usable() {
                return None;
            }
            entry.ref_count += 1;
            (entry.index.clone(), entry.generation)
        };
        Some(RetainedIndex::new(self.clone(), index, generation))
    }

    /// Removes an index.
    ///
    /// A building index can only be removed with `force`. An index still
    /// retained by readers becomes unusable at once but stays registered
    /// until the last release; the returned signal fires when it is gone.
    pub fn delete_index(&self, database: &str, id: &str, force: bool) -> RegistryResult<DeleteSignal> {
        let key = IndexKey::new(database, id);
        let mut state = self.state();
        let entry = state
            .indexes
            .get_mut(&key)
            .ok_or_else(|| RegistryError::IndexNotFound {
                database: database.to_string(),
                id: id.to_string(),
            })?;

        if entry.status == IndexStatus::NotReady && !force {
            return Err(RegistryError::IndexDeleteInvalidStatus {
                id: id.to_string(),
                status: entry.status.to_string(),
            });
        }

        let (tx, rx) = bounded(1);
        if force || entry.ref_count == 0 {
            state.remove(&key);
            debug!("index {}.{} deleted", key.database, key.id);
            let _ = tx.send(());
        } else {
            entry.status = IndexStatus::NotReady;
            entry.pending_delete = Some(tx);
            debug!(
                "index {}.{} queued for deletion, {} readers left",
                key.database, key.id, entry.ref_count
            );
        }
        Ok(CompletionSignal::new(rx))
    }

    /// Flags an index as stale so it is no longer used
    pub fn mark_outdated(&self, database: &str, id: &str) -> RegistryResult<()> {
        let mut state = self.state();
        let entry = state
            .indexes
            .get_mut(&IndexKey::new(database, id))
            .ok_or_else(|| RegistryError::IndexNotFound {
                database: database.to_string(),
                id: id.to_string(),
            })?;
        entry.status = IndexStatus::Outdated;
        debug!("index {}.{} marked outdated", database, id);
        Ok(())
    }

    /// Asks every registered driver for the indexes of every table and
    /// registers them. An index whose checksum differs from its table's
    /// is registered as outdated, every other one as ready.
    pub fn load_indexes(&self, databases: &[Arc<dyn Database>]) -> RegistryResult<()> {
        let drivers: Vec<Arc<dyn IndexDriver>> = {
            let drivers = self
                .inner
                .drivers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            drivers.values().cloned().collect()
        };

        for db in databases {
            for table_name in db.table_names() {
                let Some(table) = db.table(&table_name) else {
                    continue;
                };
                for driver in &drivers {
                    let indexes = driver.load_all(db.name(), &table_name)?;
                    if indexes.is_empty() {
                        continue;
                    }
                    let table_checksum = match table.checksumable() {
                        Some(c) => Some(c.checksum()?),
                        None => None,
                    };
                    for index in indexes {
                        let index_checksum = match index.checksumable() {
                            Some(c) => Some(c.checksum()?),
                            None => None,
                        };
                        let status = match (&index_checksum, &table_checksum) {
                            (Some(ours), Some(theirs)) if ours != theirs => {
                                warn!(
                                    "index {}.{} is outdated and will not be used, drop and recreate it",
                                    index.database(),
                                    index.id()
                                );
                                IndexStatus::Outdated
                            }
                            _ => IndexStatus::Ready,
                        };
                        self.insert_loaded(index, status);
                    }
                }
            }
        }
        Ok(())
    }

    /// Registers a loaded index, or refreshes the entry already registered
    /// under its key. Entries still building or queued for deletion are
    /// left alone.
    fn insert_loaded(&self, index: Arc<dyn Index>, status: IndexStatus) {
        let key = IndexKey::of(index.as_ref());
        let mut state = self.state();
        match state.indexes.get_mut(&key) {
            Some(entry) if entry.status == IndexStatus::NotReady || entry.pending_delete.is_some() => {
                debug!(
                    "skipped loaded index {}.{}, registered entry is {}",
                    key.database, key.id, entry.status
                );
            }
            Some(entry) => {
                debug!("reloaded index {}.{} as {}", key.database, key.id, status);
                entry.index = index;
                entry.status = status;
            }
            None => {
                debug!("loaded index {}.{} as {}", key.database, key.id, status);
                let entry = state.new_entry(index, status);
                state.insert(key, entry);
            }
        }
    }
}
