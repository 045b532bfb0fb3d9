/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::driver::Index;
use super::registry::{IndexKey, IndexRegistry};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot completion signal.
///
/// Fires at most once. If the sending side is dropped without firing,
/// waiting returns false instead of blocking forever.
#[derive(Debug)]
pub struct CompletionSignal {
    rx: Receiver<()>,
    fired: AtomicBool,
}

/// Fires once an index has been promoted to ready
pub type ReadySignal = CompletionSignal;

/// Fires once a deleted index is gone from the registry
pub type DeleteSignal = CompletionSignal;

impl CompletionSignal {
    pub(crate) fn new(rx: Receiver<()>) -> Self {
        Self {
            rx,
            fired: AtomicBool::new(false),
        }
    }

    /// Blocks until the signal fires. Returns false when it never will.
    pub fn wait(&self) -> bool {
        if self.fired.load(Ordering::Acquire) {
            return true;
        }
        match self.rx.recv() {
            Ok(()) => self.mark_fired(),
            Err(_) => self.fired.load(Ordering::Acquire),
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.fired.load(Ordering::Acquire) {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(()) => self.mark_fired(),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.fired.load(Ordering::Acquire)
            }
        }
    }

    /// Non-blocking check
    pub fn is_fired(&self) -> bool {
        if self.fired.load(Ordering::Acquire) {
            return true;
        }
        match self.rx.try_recv() {
            Ok(()) => self.mark_fired(),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                self.fired.load(Ordering::Acquire)
            }
        }
    }

    /// Underlying channel, for use in `crossbeam::select!` together with a
    /// caller owned cancellation channel
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    fn mark_fired(&self) -> bool {
        self.fired.store(true, Ordering::Release);
        true
    }
}

/// Handle held by whoever builds a freshly registered index.
///
/// `finish` promotes the index to ready and fires its `ReadySignal`.
/// Dropping the handle without finishing leaves the index not ready.
#[derive(Debug)]
pub struct IndexBuild {
    registry: IndexRegistry,
    key: IndexKey,
    ready_tx: Sender<()>,
}

impl IndexBuild {
    pub(crate) fn new(registry: IndexRegistry, key: IndexKey, ready_tx: Sender<()>) -> Self {
        Self {
            registry,
            key,
            ready_tx,
        }
    }

    /// Marks the build complete. Returns false when the index was deleted
    /// in the meantime, in which case nobody is told it became ready.
    pub fn finish(self) -> bool {
        if !self.registry.promote(&self.key) {
            return false;
        }
        let _ = self.ready_tx.send(());
        true
    }
}

/// An index retained for the lifetime of the guard
#[derive(Debug)]
pub struct RetainedIndex {
    registry: IndexRegistry,
    index: Arc<dyn Index>,
    generation: u64,
}

impl RetainedIndex {
    pub(crate) fn new(registry: IndexRegistry, index: Arc<dyn Index>, generation: u64) -> Self {
        Self {
            registry,
            index,
            generation,
        }
    }

    pub fn index(&self) -> &Arc<dyn Index> {
        &self.index
    }
}

impl Deref for RetainedIndex {
    type Target = dyn Index;

    fn deref(&self) -> &Self::Target {
        self.index.as_ref()
    }
}

impl Drop for RetainedIndex {
    fn drop(&mut self) {
        self.registry
            .release_index(self.index.as_ref(), self.generation);
    }
}
