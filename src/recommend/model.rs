//! Closed set of recommender variants.

use serde::{Deserialize, Serialize};

use super::{ItemKnn, MatrixFactorization, Popularity, RecommendationList, UserKnn};
use crate::config::ModelConfig;
use crate::error::Result;
use crate::interactions::{InteractionMatrix, UserId};
use crate::traits::Recommender;

/// Any recommender this crate provides.
///
/// This is the unit that gets configured, fitted, persisted and evaluated;
/// [`Recommender`] calls dispatch to the wrapped variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecommenderModel {
    /// User-based k-nearest neighbours
    UserKnn(UserKnn),
    /// Item-based k-nearest neighbours
    ItemKnn(ItemKnn),
    /// SGD matrix factorization
    Factorization(MatrixFactorization),
    /// Item popularity
    Popularity(Popularity),
}

impl RecommenderModel {
    /// Builds an unfitted model from its config.
    ///
    /// # Examples
    ///
    /// ```
    /// use recom::config::ModelConfig;
    /// use recom::recommend::{KnnConfig, RecommenderModel};
    /// use recom::traits::Recommender;
    ///
    /// let model = RecommenderModel::from_config(&ModelConfig::ItemKnn(KnnConfig::new(10)));
    /// assert_eq!(model.name(), "ItemKnn");
    /// assert!(!model.is_fitted());
    /// ```
    #[must_use]
    pub fn from_config(config: &ModelConfig) -> Self {
        match config {
            ModelConfig::UserKnn(knn) => Self::UserKnn(UserKnn::from_config(knn.clone())),
            ModelConfig::ItemKnn(knn) => Self::ItemKnn(ItemKnn::from_config(knn.clone())),
            ModelConfig::Factorization(mf) => {
                Self::Factorization(MatrixFactorization::new(mf.clone()))
            }
            ModelConfig::Popularity { include_seen } => {
                Self::Popularity(Popularity::new().with_include_seen(*include_seen))
            }
        }
    }

    /// Serializes into the versioned byte envelope.
    ///
    /// # Errors
    ///
    /// See [`crate::serialization::to_bytes`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::serialization::to_bytes(self)
    }

    /// Restores a model from [`RecommenderModel::to_bytes`] output.
    ///
    /// # Errors
    ///
    /// See [`crate::serialization::from_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        crate::serialization::from_bytes(bytes)
    }
}

macro_rules! dispatch {
    ($model:expr, $inner:ident => $call:expr) => {
        match $model {
            RecommenderModel::UserKnn($inner) => $call,
            RecommenderModel::ItemKnn($inner) => $call,
            RecommenderModel::Factorization($inner) => $call,
            RecommenderModel::Popularity($inner) => $call,
        }
    };
}

impl RecommenderModel {
    /// Checks that a decoded model's parts agree with each other, so that
    /// no later call can index out of bounds.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Serialization`](crate::error::RecomError::Serialization)
    /// describing the first mismatch.
    pub(crate) fn check_integrity(&self) -> Result<()> {
        dispatch!(self, m => m.check_integrity())
    }
}

impl Recommender for RecommenderModel {
    fn name(&self) -> &'static str {
        dispatch!(self, m => m.name())
    }

    fn fit(&mut self, train: &InteractionMatrix) -> Result<()> {
        dispatch!(self, m => m.fit(train))
    }

    fn is_fitted(&self) -> bool {
        dispatch!(self, m => m.is_fitted())
    }

    fn recommend(&self, user: UserId, k: usize) -> Result<RecommendationList> {
        dispatch!(self, m => m.recommend(user, k))
    }
}

impl From<UserKnn> for RecommenderModel {
    fn from(model: UserKnn) -> Self {
        Self::UserKnn(model)
    }
}

impl From<ItemKnn> for RecommenderModel {
    fn from(model: ItemKnn) -> Self {
        Self::ItemKnn(model)
    }
}

impl From<MatrixFactorization> for RecommenderModel {
    fn from(model: MatrixFactorization) -> Self {
        Self::Factorization(model)
    }
}

impl From<Popularity> for RecommenderModel {
    fn from(model: Popularity) -> Self {
        Self::Popularity(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactions::InteractionRecord;
    use crate::recommend::{FactorizationConfig, KnnConfig};

    fn ratings() -> InteractionMatrix {
        InteractionMatrix::load(vec![
            InteractionRecord::new(1, 1, 5.0),
            InteractionRecord::new(1, 2, 3.0),
            InteractionRecord::new(2, 1, 4.0),
            InteractionRecord::new(2, 3, 4.0),
            InteractionRecord::new(3, 2, 1.0),
            InteractionRecord::new(3, 3, 2.0),
        ])
        .expect("valid records")
    }

    fn all_configs() -> Vec<ModelConfig> {
        vec![
            ModelConfig::UserKnn(KnnConfig::new(2)),
            ModelConfig::ItemKnn(KnnConfig::new(2)),
            ModelConfig::Factorization(FactorizationConfig::new(2, 0.05, 0.01, 50, 1e-4)),
            ModelConfig::Popularity {
                include_seen: false,
            },
        ]
    }

    #[test]
    fn test_dispatch_matches_wrapped_model() {
        let train = ratings();
        let mut direct = UserKnn::new(2);
        direct.fit(&train).expect("fit");
        let mut wrapped = RecommenderModel::from(UserKnn::new(2));
        wrapped.fit(&train).expect("fit");
        assert_eq!(
            direct.recommend(1, 3).expect("known"),
            wrapped.recommend(1, 3).expect("known")
        );
    }

    #[test]
    fn test_every_variant_honours_contract() {
        let train = ratings();
        for config in all_configs() {
            let mut model = RecommenderModel::from_config(&config);
            assert!(!model.is_fitted());
            model.fit(&train).expect("fit");
            assert!(model.is_fitted(), "{}", model.name());

            for user in train.users() {
                let recs = model.recommend(user, 2).expect("known user");
                assert!(recs.len() <= 2);
                for item in recs.item_ids() {
                    assert_eq!(train.get(user, item), None, "{} recommended seen", model.name());
                }
            }
            assert!(model.recommend(77, 2).expect_err("unknown").is_cold_start());
        }
    }

    #[test]
    fn test_fitted_and_unfitted_models_pass_integrity_check() {
        let train = ratings();
        for config in all_configs() {
            let mut model = RecommenderModel::from_config(&config);
            model.check_integrity().expect("unfitted");
            model.fit(&train).expect("fit");
            model.check_integrity().expect("fitted");
        }
    }

    #[test]
    fn test_integrity_rejects_invalid_knn_config() {
        let model = RecommenderModel::from(UserKnn::new(0));
        let err = model.check_integrity().expect_err("k_neighbors = 0");
        assert!(matches!(err, crate::error::RecomError::Serialization(_)));
    }

    #[test]
    fn test_names() {
        let names: Vec<&str> = all_configs()
            .iter()
            .map(|c| RecommenderModel::from_config(c).name())
            .collect();
        assert_eq!(names, ["UserKnn", "ItemKnn", "MatrixFactorization", "Popularity"]);
    }
}
