// =========================================================================
// Split contract: no leakage, no loss, reproducible partitions.
//
// A split that leaks a (user, item) pair into both halves, or drops one,
// silently inflates or deflates every downstream metric. A random split
// that changes between runs with the same seed makes evaluation numbers
// irreproducible. These tests pin all three properties.
// =========================================================================

use super::*;
use crate::interactions::{InteractionMatrix, InteractionRecord, ItemId, UserId};
use std::collections::BTreeSet;

fn pairs(m: &InteractionMatrix) -> BTreeSet<(UserId, ItemId)> {
    m.iter().map(|i| (i.user_id, i.item_id)).collect()
}

fn dataset(cells: &[(u64, u64, i64)]) -> InteractionMatrix {
    InteractionMatrix::load(
        cells
            .iter()
            .map(|&(u, i, t)| InteractionRecord::new(u, i, (i % 5 + 1) as f32).with_timestamp(t)),
    )
    .expect("valid records")
}

fn assert_partition(data: &InteractionMatrix, split: &Split, label: &str) {
    let train = pairs(&split.train);
    let test = pairs(&split.test);
    let overlap: Vec<_> = train.intersection(&test).collect();
    assert!(
        overlap.is_empty(),
        "FALSIFIED {label}: {} pair(s) in both train and test",
        overlap.len()
    );
    let union: BTreeSet<_> = train.union(&test).copied().collect();
    assert_eq!(
        union,
        pairs(data),
        "FALSIFIED {label}: train ∪ test differs from the original"
    );
    for user in split.test.users() {
        assert!(
            split.train.contains_user(user),
            "FALSIFIED {label}: test user {user} has no train interaction"
        );
    }
}

/// Disjoint halves whose union is the original, for both strategies
#[test]
fn split_partitions_exactly() {
    let cells: Vec<(u64, u64, i64)> = (1..=6)
        .flat_map(|u| (1..=u + 1).map(move |i| (u, i * 3, (u * 13 + i * 7) as i64)))
        .collect();
    let data = dataset(&cells);

    let random = RandomSplit::new(0.7, 42).split(&data).expect("random split");
    assert_partition(&data, &random, "random");

    let temporal = TemporalSplit::new(0.7).split(&data).expect("temporal split");
    assert_partition(&data, &temporal, "temporal");
}

/// Same seed, same data ⇒ identical partitions
#[test]
fn random_split_same_seed_identical() {
    let cells: Vec<(u64, u64, i64)> = (1..=10)
        .flat_map(|u| (1..=8).map(move |i| (u, i, i as i64)))
        .collect();
    let data = dataset(&cells);

    let first = RandomSplit::new(0.8, 1234).split(&data).expect("split");
    for _ in 0..5 {
        let again = RandomSplit::new(0.8, 1234).split(&data).expect("split");
        let a: Vec<_> = first.test.iter().collect();
        let b: Vec<_> = again.test.iter().collect();
        assert_eq!(a, b, "FALSIFIED: same seed produced a different test half");
        assert_eq!(first.train, again.train);
    }
}

/// Input order does not influence the split
#[test]
fn random_split_independent_of_record_order() {
    let cells: Vec<(u64, u64, i64)> = (1..=5)
        .flat_map(|u| (1..=6).map(move |i| (u, i, 0)))
        .collect();
    let forward = dataset(&cells);
    let mut reversed_cells = cells.clone();
    reversed_cells.reverse();
    let reversed = dataset(&reversed_cells);

    let a = RandomSplit::new(0.5, 9).split(&forward).expect("split");
    let b = RandomSplit::new(0.5, 9).split(&reversed).expect("split");
    assert_eq!(a.test, b.test);
}

mod split_proptest {
    use super::*;
    use proptest::prelude::*;

    fn cells_strategy() -> impl Strategy<Value = Vec<(u64, u64, i64)>> {
        proptest::collection::vec((0..15u64, 0..20u64, 0..1000i64), 1..120)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        #[test]
        fn prop_random_split_partitions(
            cells in cells_strategy(),
            seed in 0..10_000u64,
            fraction in 0.05f32..0.95,
        ) {
            let data = dataset(&cells);
            let split = RandomSplit::new(fraction, seed).split(&data).expect("split");
            prop_assert_eq!(split.train.len() + split.test.len(), data.len());
            assert_partition(&data, &split, "random-prop");
        }

        #[test]
        fn prop_temporal_split_partitions(
            cells in cells_strategy(),
            fraction in 0.05f32..0.95,
        ) {
            let data = dataset(&cells);
            let split = TemporalSplit::new(fraction).split(&data).expect("split");
            prop_assert_eq!(split.train.len() + split.test.len(), data.len());
            assert_partition(&data, &split, "temporal-prop");

            // Every user with a single interaction is reported, never tested
            for user in split.skipped_users() {
                prop_assert!(!split.test.contains_user(user));
                prop_assert_eq!(data.user_items(user).map(|m| m.len()), Some(1));
            }
        }

        #[test]
        fn prop_random_split_deterministic(
            cells in cells_strategy(),
            seed in 0..10_000u64,
        ) {
            let data = dataset(&cells);
            let a = RandomSplit::new(0.6, seed).split(&data).expect("split");
            let b = RandomSplit::new(0.6, seed).split(&data).expect("split");
            prop_assert_eq!(a.train, b.train);
            prop_assert_eq!(a.test, b.test);
        }
    }
}
