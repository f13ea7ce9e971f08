//! Recommendation models.
//!
//! This module provides collaborative-filtering recommenders that share the
//! [`Recommender`](crate::traits::Recommender) contract.
//!
//! # Algorithms
//!
//! - **User-based CF** ([`UserKnn`]): similarity-weighted ratings of the
//!   nearest neighbouring users
//! - **Item-based CF** ([`ItemKnn`]): similarity-weighted ratings of the
//!   user's own items most similar to each candidate
//! - **Matrix factorization** ([`MatrixFactorization`]): SGD-learned latent
//!   factors, scored by dot product
//! - **Popularity** ([`Popularity`]): interaction counts, the usual
//!   cold-start fallback
//!
//! [`RecommenderModel`] wraps all four behind one serializable enum.
//!
//! # Quick Start
//!
//! ```
//! use recom::prelude::*;
//!
//! let train = InteractionMatrix::load(vec![
//!     InteractionRecord::new(1, 1, 5.0),
//!     InteractionRecord::new(1, 2, 4.0),
//!     InteractionRecord::new(2, 1, 5.0),
//!     InteractionRecord::new(2, 3, 2.0),
//!     InteractionRecord::new(3, 2, 4.0),
//!     InteractionRecord::new(3, 3, 1.0),
//! ]).expect("valid records");
//!
//! let mut model = ItemKnn::new(5);
//! model.fit(&train).expect("fit");
//!
//! let recs = model.recommend(1, 2).expect("known user");
//! assert_eq!(recs.item_ids(), vec![3]);
//! ```

pub mod factorization;
pub mod item_knn;
pub mod model;
pub mod popularity;
pub mod similarity;
pub mod user_knn;

pub use factorization::{FactorizationConfig, FitReport, MatrixFactorization};
pub use item_knn::ItemKnn;
pub use model::RecommenderModel;
pub use popularity::Popularity;
pub use similarity::{KnnConfig, Similarity};
pub use user_knn::UserKnn;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::interactions::ItemId;

/// One recommended item and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    /// Item id
    pub item: ItemId,
    /// Model score (higher is better)
    pub score: f32,
}

impl ScoredItem {
    /// Pair an item with its score.
    #[must_use]
    pub fn new(item: ItemId, score: f32) -> Self {
        Self { item, score }
    }
}

/// Ranking order: score descending, then item id ascending.
pub(crate) fn rank_order(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.item.cmp(&b.item))
}

/// Ranked recommendations for one user.
///
/// Invariants: at most `k` entries, scores non-increasing, equal scores in
/// ascending item order, every score finite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationList {
    items: Vec<ScoredItem>,
}

impl RecommendationList {
    /// Selects the best `k` of `scores`.
    ///
    /// Non-finite scores are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use recom::recommend::{RecommendationList, ScoredItem};
    ///
    /// let list = RecommendationList::top_k(
    ///     vec![
    ///         ScoredItem::new(7, 0.5),
    ///         ScoredItem::new(3, 0.9),
    ///         ScoredItem::new(5, 0.5),
    ///     ],
    ///     2,
    /// );
    /// assert_eq!(list.item_ids(), vec![3, 5]); // 5 beats 7 on the tie
    /// ```
    #[must_use]
    pub fn top_k<I>(scores: I, k: usize) -> Self
    where
        I: IntoIterator<Item = ScoredItem>,
    {
        if k == 0 {
            return Self::default();
        }
        let mut items: Vec<ScoredItem> = scores
            .into_iter()
            .filter(|scored| scored.score.is_finite())
            .collect();
        if items.len() > k {
            items.select_nth_unstable_by(k - 1, rank_order);
            items.truncate(k);
        }
        items.sort_by(rank_order);
        Self { items }
    }

    /// Empty list.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Ranked entries, best first.
    #[must_use]
    pub fn items(&self) -> &[ScoredItem] {
        &self.items
    }

    /// Item ids, best first.
    #[must_use]
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|scored| scored.item).collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing was recommended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate entries, best first.
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a RecommendationList {
    type Item = &'a ScoredItem;
    type IntoIter = std::slice::Iter<'a, ScoredItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
