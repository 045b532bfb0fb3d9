/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

extern crate kestrel;
use kestrel::memo_optimizer::*;
use shared::{ColSet, FuncDepSet};

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_stats() -> TableStats {
        TableStats::new()
            .with_table("shop", "orders", 10_000)
            .with_table("shop", "customers", 500)
            .with_table("shop", "regions", 10)
    }

    fn equal(l: (u16, u16, &str), r: (u16, u16, &str)) -> ScalarExpr {
        ScalarExpr::equal(ScalarExpr::col(l.0, l.1, l.2), ScalarExpr::col(r.0, r.1, r.2))
    }

    /// orders join customers join regions, each join with several physical
    /// alternatives
    fn setup_memo() -> (Memo, GroupId, GroupId) {
        let mut memo = Memo::new();
        let orders = memo.add_scan("shop", "orders", 0);
        let customers = memo.add_scan("shop", "customers", 1);
        let regions = memo.add_scan("shop", "regions", 2);

        let oc = memo.new_group();
        let base = JoinBase::new(oc, orders, customers, JoinType::Inner)
            .with_filters(vec![equal((1, 0, "o.cust"), (10, 1, "c.id"))]);
        memo.add_member(oc, RelExpr::InnerJoin(base.clone())).unwrap();
        memo.add_member(oc, RelExpr::hash_join(base.clone(), vec![], vec![]))
            .unwrap();
        memo.add_member(
            oc,
            RelExpr::merge_join(
                base.clone(),
                IndexRef::new("o_cust", 0, vec![1], false),
                IndexRef::new("c_pk", 1, vec![10], false),
            ),
        )
        .unwrap();
        memo.add_member(
            oc,
            RelExpr::lookup_join(
                base,
                Lookup::new(
                    IndexRef::new("c_pk", 1, vec![10], false),
                    vec![ScalarExpr::col(1, 0, "o.cust")],
                    vec![false],
                ),
            ),
        )
        .unwrap();

        let ocr = memo.new_group();
        let base = JoinBase::new(ocr, oc, regions, JoinType::Inner)
            .with_filters(vec![equal((11, 1, "c.region"), (20, 2, "r.id"))]);
        memo.add_member(ocr, RelExpr::InnerJoin(base.clone())).unwrap();
        memo.add_member(ocr, RelExpr::hash_join(base, vec![], vec![]))
            .unwrap();

        (memo, oc, ocr)
    }

    #[test]
    fn test_estimate_cardinalities_from_stats() {
        let (mut memo, oc, ocr) = setup_memo();
        memo.estimate_cardinalities(ocr, &Carder::new(), &setup_stats())
            .unwrap();

        assert_eq!(memo.card(GroupId(0)).unwrap(), 10_000.0);
        assert_eq!(memo.card(GroupId(1)).unwrap(), 500.0);
        assert_eq!(memo.card(GroupId(2)).unwrap(), 10.0);
        assert!((memo.card(oc).unwrap() - 0.1 * 10_000.0 * 500.0).abs() < 1e-6);
        assert!((memo.card(ocr).unwrap() - 0.1 * 500_000.0 * 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_tables_default_to_a_thousand_rows() {
        let (mut memo, _, ocr) = setup_memo();
        memo.estimate_cardinalities(ocr, &Carder::new(), &TableStats::new())
            .unwrap();
        assert_eq!(memo.card(GroupId(0)).unwrap(), 1000.0);
    }

    #[test]
    fn test_optimize_full_plan() {
        let stats = setup_stats();
        let (mut memo, oc, ocr) = setup_memo();
        memo.estimate_cardinalities(ocr, &Carder::new(), &stats)
            .unwrap();

        let total = memo.optimize(ocr, &DefaultCoster::new(), &stats).unwrap();
        assert!(total > 0.0);
        assert_eq!(memo.group(ocr).unwrap().cost(), Some(total));

        // the inner nested loop over 10k x 500 rows never wins
        assert!(!matches!(memo.best_plan(oc), Some(RelExpr::InnerJoin(_))));

        let plan = memo.explain(ocr);
        assert_eq!(plan.lines().count(), 5);
        assert!(plan.contains("TableScan(shop.orders)"));
        assert!(plan.contains("TableScan(shop.regions)"));
    }

    #[test]
    fn test_biased_passes_force_each_family() {
        let stats = setup_stats();
        let (mut memo, oc, ocr) = setup_memo();
        memo.estimate_cardinalities(ocr, &Carder::new(), &stats)
            .unwrap();

        for bias in [Bias::Inner, Bias::Hash, Bias::Merge, Bias::Lookup] {
            memo.reset_search();
            let coster = BiasedCoster::new(DefaultCoster::new(), bias);
            memo.optimize(ocr, &coster, &stats).unwrap();

            let best = memo.best_plan(oc).unwrap();
            assert!(bias.favors(best), "{:?} pass picked {}", bias, best);
        }
    }

    #[test]
    fn test_optimize_unknown_root() {
        let (mut memo, _, _) = setup_memo();
        assert_eq!(
            memo.optimize(GroupId(42), &DefaultCoster::new(), &TableStats::new()),
            Err(CostError::UnknownGroup(GroupId(42)))
        );
    }

    #[test]
    fn test_empty_group_fails() {
        let mut memo = Memo::new();
        let empty = memo.new_group();
        assert_eq!(
            memo.optimize(empty, &DefaultCoster::new(), &TableStats::new()),
            Err(CostError::EmptyGroup(empty))
        );
    }

    #[test]
    fn test_added_member_triggers_new_search() {
        let stats = setup_stats();
        let (mut memo, oc, ocr) = setup_memo();
        let cols = |ids: &[u16]| ids.iter().copied().collect::<ColSet>();
        // customers.id (col 10) is a not-null key, equated with orders.cust
        memo.set_fds(GroupId(1), FuncDepSet::for_table(cols(&[10, 11]), cols(&[10]), &[]))
            .unwrap();
        let mut join_fds = FuncDepSet::new(cols(&[1, 10, 11]));
        join_fds.add_equiv_set(&cols(&[1, 10]));
        memo.set_fds(oc, join_fds).unwrap();
        memo.estimate_cardinalities(ocr, &Carder::new(), &stats)
            .unwrap();

        let before = memo.optimize(ocr, &DefaultCoster::new(), &stats).unwrap();
        let hash = 10_000.0 * 1.01 + 500.0 * 3.0 + 0.1 * 5_000_000.0 * 0.01;
        let oc_cost = memo.group(oc).unwrap().cost().unwrap();
        assert!((oc_cost - (10_510.0 + hash)).abs() < 1e-6);

        // a merge through the unique customers key reads each side once
        let base = JoinBase::new(oc, GroupId(0), GroupId(1), JoinType::Inner)
            .with_filters(vec![equal((1, 0, "o.cust"), (10, 1, "c.id"))]);
        memo.add_member(
            oc,
            RelExpr::merge_join(
                base,
                IndexRef::new("o_cust", 0, vec![1], false),
                IndexRef::new("c_pk", 1, vec![10], true),
            ),
        )
        .unwrap();
        assert_eq!(memo.group(oc).unwrap().cost(), None);
        assert_eq!(memo.group(ocr).unwrap().cost(), None);

        let after = memo.optimize(ocr, &DefaultCoster::new(), &stats).unwrap();
        let merge = 10_500.0 * 1.01;
        assert!(matches!(memo.best_plan(oc), Some(RelExpr::MergeJoin { .. })));
        assert!((before - after - (hash - merge)).abs() < 1e-6);

        // the root total matches a search from scratch
        memo.reset_search();
        let fresh = memo.optimize(ocr, &DefaultCoster::new(), &stats).unwrap();
        assert!((after - fresh).abs() < 1e-9);
    }
}
