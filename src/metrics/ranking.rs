//! Ranking metrics for top-k recommendation.
//!
//! Every function takes a ranked list (best first) and the set of items the
//! user actually found relevant. Relevance is binary. Duplicated entries in
//! the ranked list never count twice, so all metrics stay within `[0, 1]`.

use std::collections::BTreeSet;

use crate::error::{RecomError, Result};

/// Number of distinct relevant items among the first `k` recommendations.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use recom::metrics::ranking::hits_at_k;
///
/// let relevant: BTreeSet<u64> = [3, 4].into_iter().collect();
/// assert_eq!(hits_at_k(&[5, 3, 1, 4], &relevant, 2), 1);
/// assert_eq!(hits_at_k(&[5, 3, 1, 4], &relevant, 4), 2);
/// ```
#[must_use]
pub fn hits_at_k<T: Ord>(recommended: &[T], relevant: &BTreeSet<T>, k: usize) -> usize {
    recommended
        .iter()
        .take(k)
        .filter(|item| relevant.contains(*item))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Precision@K: relevant hits in the top `k` divided by `k`.
///
/// Lists shorter than `k` are not rescaled; missing slots count as misses.
///
/// # Errors
///
/// Returns [`RecomError::Data`] when `k` is zero.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use recom::metrics::ranking::precision_at_k;
///
/// let relevant: BTreeSet<u64> = [1, 2].into_iter().collect();
/// let p = precision_at_k(&[1, 9, 2, 8], &relevant, 4).unwrap();
/// assert!((p - 0.5).abs() < 1e-6);
/// assert!(precision_at_k(&[1], &relevant, 0).is_err());
/// ```
pub fn precision_at_k<T: Ord>(recommended: &[T], relevant: &BTreeSet<T>, k: usize) -> Result<f32> {
    if k == 0 {
        return Err(RecomError::data("precision@k is undefined for k = 0"));
    }
    Ok(hits_at_k(recommended, relevant, k) as f32 / k as f32)
}

/// Recall@K: share of relevant items found in the top `k`.
///
/// Returns 0.0 when nothing is relevant.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use recom::metrics::ranking::recall_at_k;
///
/// let relevant: BTreeSet<u64> = [1, 2, 3, 4].into_iter().collect();
/// assert!((recall_at_k(&[1, 9, 2], &relevant, 3) - 0.5).abs() < 1e-6);
/// ```
#[must_use]
pub fn recall_at_k<T: Ord>(recommended: &[T], relevant: &BTreeSet<T>, k: usize) -> f32 {
    if relevant.is_empty() {
        return 0.0;
    }
    hits_at_k(recommended, relevant, k) as f32 / relevant.len() as f32
}

/// Hit@K: 1.0 if any relevant item is in the top `k`, 0.0 otherwise.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use recom::metrics::ranking::hit_at_k;
///
/// let relevant: BTreeSet<u64> = [3].into_iter().collect();
/// let predictions = [5, 3, 1, 4, 2];
///
/// assert_eq!(hit_at_k(&predictions, &relevant, 1), 0.0);  // 3 is not #1
/// assert_eq!(hit_at_k(&predictions, &relevant, 2), 1.0);  // 3 is in top 2
/// ```
#[must_use]
pub fn hit_at_k<T: Ord>(recommended: &[T], relevant: &BTreeSet<T>, k: usize) -> f32 {
    if recommended.iter().take(k).any(|item| relevant.contains(item)) {
        1.0
    } else {
        0.0
    }
}

/// Reciprocal rank: 1/rank of the first relevant item, 0.0 if none.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use recom::metrics::ranking::reciprocal_rank;
///
/// let relevant: BTreeSet<u64> = [1, 4].into_iter().collect();
/// assert!((reciprocal_rank(&[5, 3, 1, 4], &relevant) - 1.0 / 3.0).abs() < 1e-6);
/// assert_eq!(reciprocal_rank(&[5, 3], &relevant), 0.0);
/// ```
#[must_use]
pub fn reciprocal_rank<T: Ord>(recommended: &[T], relevant: &BTreeSet<T>) -> f32 {
    recommended
        .iter()
        .position(|item| relevant.contains(item))
        .map_or(0.0, |i| 1.0 / (i + 1) as f32)
}

/// Discounted Cumulative Gain at K (DCG@K).
///
/// Uses the formula `rel_i / log2(i + 1)` with 1-based positions.
///
/// # Examples
///
/// ```
/// use recom::metrics::ranking::dcg_at_k;
///
/// // DCG = 3/log2(2) + 2/log2(3) + 3/log2(4)
/// let dcg = dcg_at_k(&[3.0, 2.0, 3.0, 0.0], 3);
/// assert!((dcg - 5.762).abs() < 0.01);
/// ```
#[must_use]
pub fn dcg_at_k(relevance: &[f32], k: usize) -> f32 {
    relevance
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, &rel)| rel / (i as f32 + 2.0).log2())
        .sum()
}

/// Binary-relevance NDCG@K.
///
/// The ideal ranking places `min(|relevant|, k)` relevant items first.
/// Returns 0.0 when nothing is relevant.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use recom::metrics::ranking::ndcg_at_k;
///
/// let relevant: BTreeSet<u64> = [1, 2].into_iter().collect();
/// assert!((ndcg_at_k(&[1, 2, 3], &relevant, 3) - 1.0).abs() < 1e-6);
/// assert!(ndcg_at_k(&[3, 1, 2], &relevant, 3) < 1.0);
/// ```
#[must_use]
pub fn ndcg_at_k<T: Ord>(recommended: &[T], relevant: &BTreeSet<T>, k: usize) -> f32 {
    if relevant.is_empty() || k == 0 {
        return 0.0;
    }
    let mut counted = BTreeSet::new();
    let gains: Vec<f32> = recommended
        .iter()
        .take(k)
        .map(|item| {
            if relevant.contains(item) && counted.insert(item) {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let ideal = vec![1.0; relevant.len().min(k)];
    let idcg = dcg_at_k(&ideal, k);
    (dcg_at_k(&gains, k) / idcg).min(1.0)
}
