// =========================================================================
// FALSIFY-RK: ranking metric contract
//
// Every metric is a ratio of distinct hits, so it must stay in [0, 1] for
// any ranked list, any relevant set and any cutoff. Hit@K and recall@K
// can only grow with K.
// =========================================================================

use std::collections::BTreeSet;

use crate::metrics::ranking::*;

/// FALSIFY-RK-001: Hit@K is binary: 0.0 or 1.0
#[test]
fn falsify_rk_001_hit_at_k_binary() {
    let predictions = vec![5u64, 3, 1, 4, 2];
    let relevant: BTreeSet<u64> = [3].into_iter().collect();

    for k in 0..=6 {
        let h = hit_at_k(&predictions, &relevant, k);
        assert!(
            h == 0.0 || h == 1.0,
            "FALSIFIED RK-001: hit_at_k={h} for k={k}, expected 0.0 or 1.0"
        );
    }
}

/// FALSIFY-RK-002: Hit@K and recall@K are monotone non-decreasing in K
#[test]
fn falsify_rk_002_monotone_in_k() {
    let predictions = vec![5u64, 3, 1, 4, 2];
    let relevant: BTreeSet<u64> = [1, 2].into_iter().collect();

    let mut prev_hit = 0.0_f32;
    let mut prev_recall = 0.0_f32;
    for k in 1..=5 {
        let h = hit_at_k(&predictions, &relevant, k);
        let r = recall_at_k(&predictions, &relevant, k);
        assert!(
            h >= prev_hit && r >= prev_recall,
            "FALSIFIED RK-002: metric decreased at k={k} (hit {prev_hit}->{h}, recall {prev_recall}->{r})"
        );
        prev_hit = h;
        prev_recall = r;
    }
}

/// FALSIFY-RK-003: precision with k = 0 is rejected, not NaN
#[test]
fn falsify_rk_003_precision_k_zero_rejected() {
    let relevant: BTreeSet<u64> = [1].into_iter().collect();
    assert!(
        precision_at_k(&[1u64], &relevant, 0).is_err(),
        "FALSIFIED RK-003: precision@0 returned a value"
    );
}

mod rk_proptest_falsify {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// FALSIFY-RK-004-prop: every metric lies in [0, 1]
        #[test]
        fn falsify_rk_004_prop_metrics_bounded(
            recommended in proptest::collection::vec(0u64..20, 0..15),
            relevant in proptest::collection::btree_set(0u64..20, 0..10),
            k in 1usize..20,
        ) {
            let metrics = [
                precision_at_k(&recommended, &relevant, k).expect("k >= 1"),
                recall_at_k(&recommended, &relevant, k),
                hit_at_k(&recommended, &relevant, k),
                reciprocal_rank(&recommended, &relevant),
                ndcg_at_k(&recommended, &relevant, k),
            ];
            for (i, m) in metrics.iter().enumerate() {
                prop_assert!(
                    (0.0..=1.0).contains(m),
                    "FALSIFIED RK-004-prop: metric #{} = {} for k={}", i, m, k
                );
            }
        }

        /// FALSIFY-RK-005-prop: listing every relevant item first is a perfect NDCG
        #[test]
        fn falsify_rk_005_prop_ideal_ranking_ndcg_one(
            relevant in proptest::collection::btree_set(0u64..50, 1..10),
            k in 1usize..12,
        ) {
            let ranked: Vec<u64> = relevant.iter().copied().collect();
            let ndcg = ndcg_at_k(&ranked, &relevant, k);
            prop_assert!(
                (ndcg - 1.0).abs() < 1e-5,
                "FALSIFIED RK-005-prop: ideal ranking NDCG@{} = {}", k, ndcg
            );
        }
    }
}
