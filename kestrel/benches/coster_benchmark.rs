/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

extern crate criterion;
extern crate kestrel;

use criterion::*;
use kestrel::index_registry::*;
use kestrel::memo_optimizer::*;
use std::sync::Arc;

const TABLES: usize = 12;

fn setup_stats() -> TableStats {
    let mut stats = TableStats::new();
    for t in 0..TABLES {
        stats.set_row_count("bench", &format!("t{}", t), 100 * (t as u64 + 1));
    }
    stats
}

// Left-deep chain t0 join t1 join ... with every join strategy in each group
fn setup_memo() -> (Memo, GroupId) {
    let mut memo = Memo::new();
    let mut acc = memo.add_scan("bench", "t0", 0);
    for t in 1..TABLES {
        let table_id = t as u16;
        let scan = memo.add_scan("bench", &format!("t{}", t), table_id);
        let join = memo.new_group();
        let left_col = ScalarExpr::col(table_id * 10 - 10, table_id - 1, "l.k");
        let right_col = ScalarExpr::col(table_id * 10, table_id, "r.k");
        let base = JoinBase::new(join, acc, scan, JoinType::Inner)
            .with_filters(vec![ScalarExpr::equal(left_col.clone(), right_col)]);
        let right_index = IndexRef::new("pk", table_id, vec![table_id * 10], true);

        memo.add_member(join, RelExpr::InnerJoin(base.clone())).unwrap();
        memo.add_member(join, RelExpr::hash_join(base.clone(), vec![], vec![]))
            .unwrap();
        memo.add_member(
            join,
            RelExpr::merge_join(
                base.clone(),
                IndexRef::new("k", table_id - 1, vec![table_id * 10 - 10], false),
                right_index.clone(),
            ),
        )
        .unwrap();
        memo.add_member(
            join,
            RelExpr::lookup_join(base, Lookup::new(right_index, vec![left_col], vec![false])),
        )
        .unwrap();
        acc = join;
    }
    (memo, acc)
}

fn coster_benchmark(c: &mut Criterion) {
    let stats = setup_stats();
    let (mut memo, root) = setup_memo();
    memo.estimate_cardinalities(root, &Carder::new(), &stats)
        .unwrap();

    c.bench_function("optimize join chain", |b| {
        b.iter(|| {
            memo.reset_search();
            black_box(memo.optimize(root, &DefaultCoster::new(), &stats).unwrap())
        })
    });

    c.bench_function("optimize join chain, all biases", |b| {
        b.iter(|| {
            for bias in Bias::ALL {
                memo.reset_search();
                let coster = BiasedCoster::new(DefaultCoster::new(), bias);
                black_box(memo.optimize(root, &coster, &stats).unwrap());
            }
        })
    });
}

fn registry_benchmark(c: &mut Criterion) {
    let registry = IndexRegistry::new();
    for i in 0..64 {
        let index: Arc<dyn Index> = Arc::new(MemoryIndex::new(
            "bench",
            "t",
            &format!("idx{}", i),
            vec![format!("c{}", i), format!("c{}", i + 1)],
            "mem",
            IndexConfig::new(),
        ));
        let (build, ready) = registry.add_index(index).unwrap();
        build.finish();
        ready.wait();
    }

    c.bench_function("acquire and release", |b| {
        b.iter(|| black_box(registry.acquire("bench", "idx32").unwrap()))
    });

    c.bench_function("expressions with indexes", |b| {
        b.iter(|| black_box(registry.expressions_with_indexes("bench", &["c10", "c11", "c12"])))
    });
}

criterion_group!(benches, coster_benchmark, registry_benchmark);
criterion_main!(benches);
