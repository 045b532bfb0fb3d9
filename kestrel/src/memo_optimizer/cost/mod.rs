/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod biased;
pub mod cardinality;
pub mod constants;
pub mod estimator;
pub mod injectivity;

pub use biased::{Bias, BiasedCoster};
pub use cardinality::Carder;
pub use constants::{CostConstants, CostModel};
pub use estimator::{Coster, DefaultCoster};
pub use injectivity::{is_injective_lookup, lookup_join_selectivity};
