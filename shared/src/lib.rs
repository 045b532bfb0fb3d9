/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod col_set;
pub mod func_deps;

pub use col_set::{ColSet, ColumnId, IdSet, TableId, TableSet};
pub use func_deps::{EquivSets, FuncDepSet, Key};
