//! User-based collaborative filtering.
//!
//! `fit` precomputes a similarity row for every user against every other
//! user restricted to co-rated items. This costs O(U² · avg_items_per_user)
//! in the worst case and is the scalability ceiling of this model; prefer
//! [`super::ItemKnn`] when items are far fewer than users.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::similarity::{self, KnnConfig, NeighbourRow, Similarity};
use super::{RecommendationList, ScoredItem};
use crate::error::{RecomError, Result};
use crate::interactions::{InteractionMatrix, UserId};
use crate::traits::Recommender;

/// Learned state of a fitted [`UserKnn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct UserKnnArtifact {
    train: InteractionMatrix,
    neighbours: BTreeMap<UserId, NeighbourRow>,
}

/// User-based k-nearest-neighbour recommender.
///
/// The score of a candidate item is the similarity-weighted average rating
/// given to it by the `k_neighbors` most similar users who rated it.
///
/// # Examples
///
/// ```
/// use recom::prelude::*;
///
/// let train = InteractionMatrix::load(vec![
///     InteractionRecord::new(1, 1, 5.0),
///     InteractionRecord::new(1, 2, 3.0),
///     InteractionRecord::new(2, 1, 4.0),
///     InteractionRecord::new(2, 3, 4.0),
///     InteractionRecord::new(3, 2, 1.0),
///     InteractionRecord::new(3, 4, 2.0),
/// ]).expect("valid records");
///
/// let mut model = UserKnn::new(2).with_similarity(Similarity::Cosine);
/// model.fit(&train).expect("fit");
///
/// let recs = model.recommend(1, 3).expect("known user");
/// assert_eq!(recs.item_ids(), vec![3, 4]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserKnn {
    config: KnnConfig,
    artifact: Option<UserKnnArtifact>,
}

impl UserKnn {
    /// Create an unfitted model using `k_neighbors` neighbours per score.
    #[must_use]
    pub fn new(k_neighbors: usize) -> Self {
        Self::from_config(KnnConfig::new(k_neighbors))
    }

    /// Create an unfitted model from a full config.
    #[must_use]
    pub fn from_config(config: KnnConfig) -> Self {
        Self {
            config,
            artifact: None,
        }
    }

    /// Set the similarity measure.
    #[must_use]
    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.config.similarity = similarity;
        self
    }

    /// Require at least `min_overlap` co-rated items between neighbours.
    #[must_use]
    pub fn with_min_overlap(mut self, min_overlap: usize) -> Self {
        self.config.min_overlap = min_overlap;
        self
    }

    /// Allow already-seen items in recommendations.
    #[must_use]
    pub fn with_include_seen(mut self, include_seen: bool) -> Self {
        self.config.include_seen = include_seen;
        self
    }

    /// Hyperparameters.
    #[must_use]
    pub fn config(&self) -> &KnnConfig {
        &self.config
    }

    /// Similar users of `user`, best first, or `None` if unknown or unfitted.
    #[must_use]
    pub fn neighbours(&self, user: UserId) -> Option<&[(UserId, f32)]> {
        self.artifact
            .as_ref()
            .and_then(|a| a.neighbours.get(&user))
            .map(Vec::as_slice)
    }

    /// Checks that a decoded model's parts agree with each other.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Serialization`] describing the first mismatch.
    pub(crate) fn check_integrity(&self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| RecomError::corrupt_artifact(self.name(), e))?;
        let Some(artifact) = &self.artifact else {
            return Ok(());
        };
        if !artifact.train.is_well_formed() {
            return Err(RecomError::corrupt_artifact(
                self.name(),
                "training interactions are inconsistent or non-finite",
            ));
        }
        if !similarity::rows_well_formed(&artifact.neighbours) {
            return Err(RecomError::corrupt_artifact(
                self.name(),
                "neighbour similarities must be finite and positive",
            ));
        }
        Ok(())
    }
}

impl Recommender for UserKnn {
    fn name(&self) -> &'static str {
        "UserKnn"
    }

    fn fit(&mut self, train: &InteractionMatrix) -> Result<()> {
        self.config.validate()?;
        if train.is_empty() {
            return Err(RecomError::data("UserKnn: cannot fit on empty training data"));
        }

        let rows = similarity::user_rows(train);
        let columns = similarity::item_rows(train);
        let neighbours = similarity::neighbour_rows(
            &rows,
            &columns,
            self.config.similarity,
            self.config.min_overlap,
        );

        let n_pairs: usize = neighbours.values().map(Vec::len).sum();
        tracing::info!(
            model = self.name(),
            n_users = train.n_users(),
            n_items = train.n_items(),
            n_pairs,
            similarity = ?self.config.similarity,
            "user similarity computed"
        );

        self.artifact = Some(UserKnnArtifact {
            train: train.clone(),
            neighbours,
        });
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.artifact.is_some()
    }

    fn recommend(&self, user: UserId, k: usize) -> Result<RecommendationList> {
        let artifact = self
            .artifact
            .as_ref()
            .ok_or_else(|| RecomError::not_fitted(self.name()))?;
        let seen = artifact
            .train
            .user_items(user)
            .ok_or_else(|| RecomError::cold_start_user(user, "UserKnn::recommend"))?;
        if k == 0 {
            return Ok(RecommendationList::empty());
        }

        // item -> (weighted rating sum, similarity sum, contributors)
        let mut accum: BTreeMap<u64, (f64, f64, usize)> = BTreeMap::new();
        let row = artifact
            .neighbours
            .get(&user)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for &(neighbour, sim) in row {
            let Some(rated) = artifact.train.user_items(neighbour) else {
                continue;
            };
            for (&item, entry) in rated {
                if !self.config.include_seen && seen.contains_key(&item) {
                    continue;
                }
                let slot = accum.entry(item).or_insert((0.0, 0.0, 0));
                // Row is sorted best-first, so the first k contributors are the k nearest.
                if slot.2 < self.config.k_neighbors {
                    slot.0 += f64::from(sim) * f64::from(entry.value);
                    slot.1 += f64::from(sim);
                    slot.2 += 1;
                }
            }
        }

        let scores = accum
            .into_iter()
            .filter(|(_, (_, sim_sum, _))| *sim_sum > 0.0)
            .map(|(item, (weighted, sim_sum, _))| ScoredItem::new(item, (weighted / sim_sum) as f32));
        Ok(RecommendationList::top_k(scores, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactions::InteractionRecord;

    fn ratings() -> InteractionMatrix {
        InteractionMatrix::load(vec![
            InteractionRecord::new(1, 1, 5.0),
            InteractionRecord::new(1, 2, 3.0),
            InteractionRecord::new(1, 3, 4.0),
            InteractionRecord::new(2, 1, 4.0),
            InteractionRecord::new(2, 2, 3.0),
            InteractionRecord::new(2, 4, 5.0),
            InteractionRecord::new(3, 1, 1.0),
            InteractionRecord::new(3, 3, 5.0),
            InteractionRecord::new(3, 4, 1.0),
            InteractionRecord::new(3, 5, 2.0),
            InteractionRecord::new(4, 6, 3.0),
        ])
        .expect("valid records")
    }

    #[test]
    fn test_recommend_excludes_seen_items() {
        let mut model = UserKnn::new(2);
        model.fit(&ratings()).expect("fit");
        let recs = model.recommend(1, 10).expect("known user");
        for item in recs.item_ids() {
            assert!(![1, 2, 3].contains(&item), "seen item {item} recommended");
        }
        assert!(!recs.is_empty());
    }

    #[test]
    fn test_scores_are_weighted_average_of_neighbours() {
        let train = InteractionMatrix::load(vec![
            InteractionRecord::new(1, 1, 2.0),
            InteractionRecord::new(2, 1, 4.0),
            InteractionRecord::new(2, 9, 5.0),
            InteractionRecord::new(3, 1, 1.0),
            InteractionRecord::new(3, 9, 1.0),
        ])
        .expect("valid records");
        let mut model = UserKnn::new(5);
        model.fit(&train).expect("fit");

        // Both neighbours have cosine 1 with user 1 over item 1.
        let recs = model.recommend(1, 1).expect("known user");
        assert_eq!(recs.item_ids(), vec![9]);
        assert!((recs.items()[0].score - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_neighbors_limits_contributors() {
        let train = InteractionMatrix::load(vec![
            InteractionRecord::new(1, 1, 5.0),
            InteractionRecord::new(1, 2, 1.0),
            // user 2 agrees with user 1 exactly
            InteractionRecord::new(2, 1, 5.0),
            InteractionRecord::new(2, 2, 1.0),
            InteractionRecord::new(2, 9, 5.0),
            // user 3 is less similar
            InteractionRecord::new(3, 1, 1.0),
            InteractionRecord::new(3, 2, 5.0),
            InteractionRecord::new(3, 9, 1.0),
        ])
        .expect("valid records");
        let mut model = UserKnn::new(1);
        model.fit(&train).expect("fit");

        let recs = model.recommend(1, 1).expect("known user");
        assert!((recs.items()[0].score - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_user_is_cold_start() {
        let mut model = UserKnn::new(2);
        model.fit(&ratings()).expect("fit");
        let err = model.recommend(99, 3).expect_err("unknown user");
        assert!(err.is_cold_start());
    }

    #[test]
    fn test_user_without_neighbours_gets_empty_list() {
        let mut model = UserKnn::new(2);
        model.fit(&ratings()).expect("fit");
        // User 4 shares no item with anyone.
        let recs = model.recommend(4, 3).expect("known user");
        assert!(recs.is_empty());
    }

    #[test]
    fn test_not_fitted() {
        let model = UserKnn::new(2);
        assert!(matches!(
            model.recommend(1, 3),
            Err(RecomError::NotFitted { .. })
        ));
    }

    #[test]
    fn test_fit_rejects_empty_and_bad_config() {
        let mut model = UserKnn::new(2);
        assert!(matches!(
            model.fit(&InteractionMatrix::new()),
            Err(RecomError::Data { .. })
        ));
        let mut model = UserKnn::new(0);
        assert!(matches!(
            model.fit(&ratings()),
            Err(RecomError::InvalidHyperparameter { .. })
        ));
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let mut model = UserKnn::new(2);
        model.fit(&ratings()).expect("fit");
        assert!(model.recommend(1, 0).expect("known user").is_empty());
    }

    #[test]
    fn test_include_seen() {
        let mut model = UserKnn::new(3).with_include_seen(true);
        model.fit(&ratings()).expect("fit");
        let recs = model.recommend(1, 10).expect("known user");
        assert!(recs.item_ids().contains(&1));
    }

    #[test]
    fn test_refit_replaces_artifact() {
        let mut model = UserKnn::new(2);
        model.fit(&ratings()).expect("fit");
        let small = InteractionMatrix::load(vec![InteractionRecord::new(7, 1, 1.0)])
            .expect("valid records");
        model.fit(&small).expect("refit");
        assert!(model.recommend(1, 3).expect_err("old user gone").is_cold_start());
        assert!(model.recommend(7, 3).expect("new user").is_empty());
    }

    #[test]
    fn test_parallel_rows_match_sequential() {
        let train = ratings();
        let rows = similarity::user_rows(&train);
        let columns = similarity::item_rows(&train);
        for measure in [Similarity::Cosine, Similarity::Pearson] {
            let all = similarity::neighbour_rows(&rows, &columns, measure, 1);
            for (&user, row) in &all {
                let single = similarity::neighbour_row(user, &rows, &columns, measure, 1);
                assert_eq!(row, &single);
            }
        }
    }
}
