/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// Lifecycle state of a registered index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexStatus {
    /// Registered but still building, or queued for deletion
    NotReady,
    Ready,
    /// Built against a different version of its table; must be rebuilt
    Outdated,
}

impl IndexStatus {
    pub fn is_ready(&self) -> bool {
        *self == IndexStatus::Ready
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexStatus::NotReady => "not ready",
            IndexStatus::Ready => "ready",
            IndexStatus::Outdated => "outdated",
        };
        write!(f, "{}", s)
    }
}
