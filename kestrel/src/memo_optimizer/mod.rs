/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Cost-based selection of physical join strategies
//!
//! Plans are held in a `Memo`: an arena of groups, each group collecting
//! physical alternatives that produce the same rows. The coster prices one
//! alternative at a time from the cached row counts of its input groups,
//! and the search keeps the cheapest alternative per group.
//!
//! ## Architecture
//!
//! - `operators`: physical operators and join descriptors
//! - `scalar`: filter and key expressions
//! - `memo`: groups, plan search and plan rendering
//! - `cost`: cost model, coster, biased costers and cardinality estimation
//! - `stats`: table statistics consumed by costing
//!
//! ## Usage
//!
//! ```rust
//! use kestrel::memo_optimizer::{DefaultCoster, JoinBase, JoinType, Memo, RelExpr, TableStats};
//!
//! let stats = TableStats::new()
//!     .with_table("shop", "orders", 10_000)
//!     .with_table("shop", "customers", 500);
//!
//! let mut memo = Memo::new();
//! let orders = memo.add_scan("shop", "orders", 0);
//! let customers = memo.add_scan("shop", "customers", 1);
//! memo.set_card(orders, 10_000.0).unwrap();
//! memo.set_card(customers, 500.0).unwrap();
//!
//! let join = memo.new_group();
//! let base = JoinBase::new(join, orders, customers, JoinType::Inner);
//! memo.add_member(join, RelExpr::InnerJoin(base.clone())).unwrap();
//! memo.add_member(join, RelExpr::hash_join(base, vec![], vec![])).unwrap();
//!
//! let cost = memo.optimize(join, &DefaultCoster::new(), &stats).unwrap();
//! assert!(cost > 0.0);
//! println!("{}", memo.explain(join));
//! ```

pub mod cost;
pub mod errors;
pub mod memo;
pub mod operators;
pub mod scalar;
pub mod stats;

// Re-export main components for convenience
pub use cost::{Bias, BiasedCoster, Carder, CostConstants, CostModel, Coster, DefaultCoster};
pub use errors::{ConfigError, CostError, CostResult, StatsError, StatsResult};
pub use memo::{Group, GroupId, Memo, RelProps};
pub use operators::{IndexRef, JoinBase, JoinType, Lookup, RangeHeap, RelExpr};
pub use scalar::{CompareOp, ScalarExpr, ScalarProps};
pub use stats::{StatsProvider, TableStats};
