//! Core trait shared by every recommender.
//!
//! The trait defines the fit/recommend contract; the concrete strategies
//! live in [`crate::recommend`].

use std::collections::BTreeMap;

use crate::error::Result;
use crate::interactions::{InteractionMatrix, UserId};
use crate::recommend::RecommendationList;

/// Fit/recommend contract for collaborative-filtering models.
///
/// `fit` replaces any previous artifact with a freshly built one;
/// `recommend` only reads it, so a fitted model can be shared across
/// threads for concurrent queries.
///
/// # Examples
///
/// ```
/// use recom::prelude::*;
///
/// let train = InteractionMatrix::load(vec![
///     InteractionRecord::new(1, 10, 5.0),
///     InteractionRecord::new(1, 11, 3.0),
///     InteractionRecord::new(2, 10, 4.0),
///     InteractionRecord::new(2, 12, 5.0),
/// ]).unwrap();
///
/// let mut model = UserKnn::new(2);
/// model.fit(&train).unwrap();
///
/// let recs = model.recommend(1, 5).unwrap();
/// assert_eq!(recs.item_ids(), vec![12]);
/// ```
pub trait Recommender {
    /// Short variant name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Learns a new artifact from `train`.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input or invalid hyperparameters.
    fn fit(&mut self, train: &InteractionMatrix) -> Result<()>;

    /// True once `fit` has succeeded.
    fn is_fitted(&self) -> bool;

    /// Top-`k` items for `user`, best first, ties by ascending item id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::RecomError::NotFitted`] before `fit` and
    /// [`crate::error::RecomError::ColdStart`] for a user absent from the
    /// training data.
    fn recommend(&self, user: UserId, k: usize) -> Result<RecommendationList>;

    /// Recommends for many users, keyed by user id.
    ///
    /// Users are scored independently (in parallel with the `parallel`
    /// feature); the output does not depend on the number of workers.
    fn recommend_many(
        &self,
        users: &[UserId],
        k: usize,
    ) -> BTreeMap<UserId, Result<RecommendationList>>
    where
        Self: Sync,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            users
                .par_iter()
                .map(|&user| (user, self.recommend(user, k)))
                .collect::<Vec<_>>()
                .into_iter()
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            users
                .iter()
                .map(|&user| (user, self.recommend(user, k)))
                .collect()
        }
    }
}
