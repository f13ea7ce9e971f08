//! Item-based collaborative filtering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::similarity::{self, KnnConfig, NeighbourRow, Similarity};
use super::{RecommendationList, ScoredItem};
use crate::error::{RecomError, Result};
use crate::interactions::{InteractionMatrix, ItemId, UserId};
use crate::traits::Recommender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ItemKnnArtifact {
    train: InteractionMatrix,
    neighbours: BTreeMap<ItemId, NeighbourRow>,
}

/// Item-based k-nearest-neighbour recommender.
///
/// For a candidate item `j`, the score is the similarity-weighted average of
/// the user's own ratings on the `k_neighbors` items most similar to `j`.
/// Item–item similarity is computed over co-rating users. Fitting costs
/// O(I² · avg_users_per_item) at worst, which is usually cheaper than
/// [`super::UserKnn`] when items are far fewer than users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemKnn {
    config: KnnConfig,
    artifact: Option<ItemKnnArtifact>,
}

impl ItemKnn {
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

    /// Require at least `min_overlap` co-rating users between neighbours.
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

    /// Items similar to `item`, best first.
    #[must_use]
    pub fn similar_items(&self, item: ItemId) -> Option<&[(ItemId, f32)]> {
        self.artifact
            .as_ref()
            .and_then(|a| a.neighbours.get(&item))
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

impl Recommender for ItemKnn {
    fn name(&self) -> &'static str {
        "ItemKnn"
    }

    fn fit(&mut self, train: &InteractionMatrix) -> Result<()> {
        self.config.validate()?;
        if train.is_empty() {
            return Err(RecomError::data("ItemKnn: cannot fit on empty training data"));
        }

        let rows = similarity::item_rows(train);
        let columns = similarity::user_rows(train);
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
            "item similarity computed"
        );

        self.artifact = Some(ItemKnnArtifact {
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
        let rated = artifact
            .train
            .user_items(user)
            .ok_or_else(|| RecomError::cold_start_user(user, "ItemKnn::recommend"))?;
        if k == 0 {
            return Ok(RecommendationList::empty());
        }

        // candidate -> [(similarity, rated item, rating)]
        let mut contributions: BTreeMap<ItemId, Vec<(f32, ItemId, f32)>> = BTreeMap::new();
        for (&item, entry) in rated {
            let Some(row) = artifact.neighbours.get(&item) else {
                continue;
            };
            for &(candidate, sim) in row {
                if !self.config.include_seen && rated.contains_key(&candidate) {
                    continue;
                }
                contributions
                    .entry(candidate)
                    .or_default()
                    .push((sim, item, entry.value));
            }
        }

        let k_neighbors = self.config.k_neighbors;
        let scores = contributions.into_iter().filter_map(|(candidate, mut list)| {
            list.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
            list.truncate(k_neighbors);
            let (weighted, sim_sum) = list.iter().fold((0.0f64, 0.0f64), |(w, s), &(sim, _, r)| {
                (w + f64::from(sim) * f64::from(r), s + f64::from(sim))
            });
            (sim_sum > 0.0).then(|| ScoredItem::new(candidate, (weighted / sim_sum) as f32))
        });
        Ok(RecommendationList::top_k(scores, k))
    }
}
