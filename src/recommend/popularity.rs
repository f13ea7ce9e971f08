//! Popularity baseline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{RecommendationList, ScoredItem};
use crate::error::{RecomError, Result};
use crate::interactions::{InteractionMatrix, ItemId, UserId};
use crate::traits::Recommender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PopularityArtifact {
    train: InteractionMatrix,
    counts: BTreeMap<ItemId, usize>,
}

/// Ranks items by how many users interacted with them in training.
///
/// Ties are broken by ascending item id. Beyond the usual [`Recommender`]
/// contract, [`Popularity::most_popular`] needs no user at all, which makes
/// it the natural fallback when another model reports a cold-start user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Popularity {
    #[serde(default)]
    include_seen: bool,
    artifact: Option<PopularityArtifact>,
}

impl Popularity {
    /// Create an unfitted model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow already-seen items in per-user recommendations.
    #[must_use]
    pub fn with_include_seen(mut self, include_seen: bool) -> Self {
        self.include_seen = include_seen;
        self
    }

    /// Interaction count of `item` in the training data.
    #[must_use]
    pub fn count(&self, item: ItemId) -> Option<usize> {
        self.artifact.as_ref()?.counts.get(&item).copied()
    }

    /// The `k` most popular items regardless of user.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::NotFitted`] before fit.
    pub fn most_popular(&self, k: usize) -> Result<RecommendationList> {
        let artifact = self
            .artifact
            .as_ref()
            .ok_or_else(|| RecomError::not_fitted(self.name()))?;
        Ok(Self::rank(artifact, k, |_| true))
    }

    /// Checks that a decoded model's parts agree with each other.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Serialization`] describing the first mismatch.
    pub(crate) fn check_integrity(&self) -> Result<()> {
        let Some(artifact) = &self.artifact else {
            return Ok(());
        };
        if !artifact.train.is_well_formed() {
            return Err(RecomError::corrupt_artifact(
                self.name(),
                "training interactions are inconsistent or non-finite",
            ));
        }
        let counts_match = artifact.counts.len() == artifact.train.n_items()
            && artifact.counts.iter().all(|(&item, &count)| {
                artifact.train.item_users(item).map(BTreeMap::len) == Some(count)
            });
        if !counts_match {
            return Err(RecomError::corrupt_artifact(
                self.name(),
                "item counts do not match training interactions",
            ));
        }
        Ok(())
    }

    fn rank(
        artifact: &PopularityArtifact,
        k: usize,
        keep: impl Fn(ItemId) -> bool,
    ) -> RecommendationList {
        let scores = artifact
            .counts
            .iter()
            .filter(|&(&item, _)| keep(item))
            .map(|(&item, &count)| ScoredItem::new(item, count as f32));
        RecommendationList::top_k(scores, k)
    }
}

impl Recommender for Popularity {
    fn name(&self) -> &'static str {
        "Popularity"
    }

    fn fit(&mut self, train: &InteractionMatrix) -> Result<()> {
        if train.is_empty() {
            return Err(RecomError::data("Popularity: cannot fit on empty training data"));
        }
        let counts: BTreeMap<ItemId, usize> = train
            .items()
            .into_iter()
            .map(|item| (item, train.item_users(item).map_or(0, BTreeMap::len)))
            .collect();
        tracing::info!(model = self.name(), n_items = counts.len(), "item counts computed");
        self.artifact = Some(PopularityArtifact {
            train: train.clone(),
            counts,
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
            .ok_or_else(|| RecomError::cold_start_user(user, "Popularity::recommend"))?;
        let include_seen = self.include_seen;
        Ok(Self::rank(artifact, k, |item| {
            include_seen || !seen.contains_key(&item)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactions::InteractionRecord;

    fn ratings() -> InteractionMatrix {
        InteractionMatrix::load(vec![
            InteractionRecord::new(1, 10, 1.0),
            InteractionRecord::new(2, 10, 1.0),
            InteractionRecord::new(3, 10, 1.0),
            InteractionRecord::new(1, 20, 1.0),
            InteractionRecord::new(2, 30, 1.0),
            InteractionRecord::new(3, 30, 1.0),
            InteractionRecord::new(3, 5, 1.0),
        ])
        .expect("valid records")
    }

    #[test]
    fn test_most_popular_with_tie_break() {
        let mut model = Popularity::new();
        model.fit(&ratings()).expect("fit");
        let top = model.most_popular(4).expect("fitted");
        // 20 and 5 tie at one interaction each; 5 has the lower id
        assert_eq!(top.item_ids(), vec![10, 30, 5, 20]);
        assert_eq!(model.count(10), Some(3));
    }

    #[test]
    fn test_recommend_excludes_seen() {
        let mut model = Popularity::new();
        model.fit(&ratings()).expect("fit");
        let recs = model.recommend(1, 5).expect("known user");
        assert_eq!(recs.item_ids(), vec![30, 5]);
    }

    #[test]
    fn test_include_seen() {
        let mut model = Popularity::new().with_include_seen(true);
        model.fit(&ratings()).expect("fit");
        let recs = model.recommend(1, 1).expect("known user");
        assert_eq!(recs.item_ids(), vec![10]);
    }

    #[test]
    fn test_cold_start_and_not_fitted() {
        let model = Popularity::new();
        assert!(matches!(
            model.most_popular(3),
            Err(RecomError::NotFitted { .. })
        ));
        let mut model = model;
        model.fit(&ratings()).expect("fit");
        assert!(model.recommend(99, 3).expect_err("unknown").is_cold_start());
        assert!(model.most_popular(0).expect("fitted").is_empty());
    }

    #[test]
    fn test_integrity_detects_count_mismatch() {
        let mut model = Popularity::new();
        model.fit(&ratings()).expect("fit");
        assert!(model.check_integrity().is_ok());
        if let Some(artifact) = model.artifact.as_mut() {
            artifact.counts.insert(10, 7);
        }
        assert!(matches!(
            model.check_integrity(),
            Err(RecomError::Serialization(_))
        ));
    }
}
