//! Matrix factorization by stochastic gradient descent.
//!
//! Learns user factors `P` and item factors `Q` minimizing
//!
//! ```text
//! Σ_(u,i observed) (r_ui − p_u · q_i)² + λ (‖P‖² + ‖Q‖²)
//! ```
//!
//! Initialization and the per-epoch visiting order come from one generator
//! seeded with `seed`, so a fit is fully reproducible.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{RecommendationList, ScoredItem};
use crate::error::{ConvergenceWarning, RecomError, Result};
use crate::interactions::{InteractionMatrix, ItemId, UserId};
use crate::traits::Recommender;

/// Hyperparameters for [`MatrixFactorization`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorizationConfig {
    /// Latent dimension
    pub n_factors: usize,
    /// SGD step size
    pub learning_rate: f32,
    /// L2 penalty on both factor matrices
    pub regularization: f32,
    /// Upper bound on passes over the data
    pub max_epochs: usize,
    /// Stop once the relative change in epoch loss falls below this
    pub tolerance: f32,
    /// Generator seed
    #[serde(default)]
    pub seed: u64,
    /// Factors start uniform in `[-init_scale, init_scale]`
    #[serde(default = "default_init_scale")]
    pub init_scale: f32,
    /// Allow already-seen items in recommendations
    #[serde(default)]
    pub include_seen: bool,
}

fn default_init_scale() -> f32 {
    0.1
}

impl FactorizationConfig {
    /// Config with the required hyperparameters and defaults elsewhere.
    #[must_use]
    pub fn new(
        n_factors: usize,
        learning_rate: f32,
        regularization: f32,
        max_epochs: usize,
        tolerance: f32,
    ) -> Self {
        Self {
            n_factors,
            learning_rate,
            regularization,
            max_epochs,
            tolerance,
            seed: 0,
            init_scale: default_init_scale(),
            include_seen: false,
        }
    }

    /// Checks hyperparameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::InvalidHyperparameter`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.n_factors == 0 {
            return Err(RecomError::invalid_hyperparameter("n_factors", self.n_factors, ">= 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RecomError::invalid_hyperparameter(
                "learning_rate",
                self.learning_rate,
                "finite and > 0",
            ));
        }
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return Err(RecomError::invalid_hyperparameter(
                "regularization",
                self.regularization,
                "finite and >= 0",
            ));
        }
        if self.max_epochs == 0 {
            return Err(RecomError::invalid_hyperparameter("max_epochs", self.max_epochs, ">= 1"));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(RecomError::invalid_hyperparameter(
                "tolerance",
                self.tolerance,
                "finite and >= 0",
            ));
        }
        if !(self.init_scale.is_finite() && self.init_scale > 0.0) {
            return Err(RecomError::invalid_hyperparameter(
                "init_scale",
                self.init_scale,
                "finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Summary of the last fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Epochs actually run
    pub epochs: usize,
    /// Mean objective per observed interaction after the last epoch
    pub final_loss: f32,
    /// Whether the tolerance was reached before `max_epochs`
    pub converged: bool,
    /// Present when `converged` is false
    pub warning: Option<ConvergenceWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FactorArtifact {
    train: InteractionMatrix,
    user_index: BTreeMap<UserId, usize>,
    item_index: BTreeMap<ItemId, usize>,
    item_ids: Vec<ItemId>,
    /// Row-major `n_users × n_factors`
    user_factors: Vec<f32>,
    /// Row-major `n_items × n_factors`
    item_factors: Vec<f32>,
}

impl FactorArtifact {
    fn user_vector(&self, idx: usize, n_factors: usize) -> &[f32] {
        &self.user_factors[idx * n_factors..(idx + 1) * n_factors]
    }

    fn item_vector(&self, idx: usize, n_factors: usize) -> &[f32] {
        &self.item_factors[idx * n_factors..(idx + 1) * n_factors]
    }

    /// Every index lookup in `recommend` and `predict` stays in bounds.
    fn check_shape(&self, n_factors: usize) -> std::result::Result<(), String> {
        if !self.train.is_well_formed() {
            return Err("training interactions are inconsistent or non-finite".to_string());
        }
        if !self.user_index.keys().copied().eq(self.train.users())
            || !self.user_index.values().copied().eq(0..self.user_index.len())
        {
            return Err("user index does not match training users".to_string());
        }
        if self.item_ids != self.train.items()
            || !self.item_index.keys().eq(self.item_ids.iter())
            || !self.item_index.values().copied().eq(0..self.item_ids.len())
        {
            return Err("item index does not match training items".to_string());
        }
        if self.user_index.len().checked_mul(n_factors) != Some(self.user_factors.len()) {
            return Err(format!(
                "{} user factors for {} users x {n_factors} factors",
                self.user_factors.len(),
                self.user_index.len()
            ));
        }
        if self.item_ids.len().checked_mul(n_factors) != Some(self.item_factors.len()) {
            return Err(format!(
                "{} item factors for {} items x {n_factors} factors",
                self.item_factors.len(),
                self.item_ids.len()
            ));
        }
        if !self
            .user_factors
            .iter()
            .chain(&self.item_factors)
            .all(|w| w.is_finite())
        {
            return Err("non-finite factor".to_string());
        }
        Ok(())
    }
}

/// Length of a row-major `rows × n_factors` matrix.
fn factor_len(rows: usize, n_factors: usize) -> Result<usize> {
    rows.checked_mul(n_factors).ok_or_else(|| {
        RecomError::invalid_hyperparameter(
            "n_factors",
            n_factors,
            "small enough that rows * n_factors fits in usize",
        )
    })
}

/// Factors drawn uniformly from `[-scale, scale]`.
fn init_factors(len: usize, n_factors: usize, scale: f32, rng: &mut StdRng) -> Result<Vec<f32>> {
    let mut factors = Vec::new();
    factors.try_reserve_exact(len).map_err(|_| {
        RecomError::invalid_hyperparameter(
            "n_factors",
            n_factors,
            "small enough for the factor matrices to fit in memory",
        )
    })?;
    factors.extend((0..len).map(|_| rng.gen_range(-scale..=scale)));
    Ok(factors)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Latent-factor recommender trained with SGD.
///
/// # Examples
///
/// ```
/// use recom::prelude::*;
///
/// let train = InteractionMatrix::load(vec![
///     InteractionRecord::new(1, 1, 5.0),
///     InteractionRecord::new(1, 2, 1.0),
///     InteractionRecord::new(2, 1, 4.0),
///     InteractionRecord::new(2, 3, 5.0),
/// ]).expect("valid records");
///
/// let config = FactorizationConfig::new(4, 0.05, 0.01, 500, 1e-6);
/// let mut model = MatrixFactorization::new(config).with_seed(7);
/// model.fit(&train).expect("fit");
///
/// let score = model.predict(1, 1).expect("known pair");
/// assert!(score > 3.0);
/// assert!(model.predict(1, 99).unwrap_err().is_cold_start());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixFactorization {
    config: FactorizationConfig,
    artifact: Option<FactorArtifact>,
    report: Option<FitReport>,
}

impl MatrixFactorization {
    /// Create an unfitted model.
    #[must_use]
    pub fn new(config: FactorizationConfig) -> Self {
        Self {
            config,
            artifact: None,
            report: None,
        }
    }

    /// Set the generator seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
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
    pub fn config(&self) -> &FactorizationConfig {
        &self.config
    }

    /// Summary of the last successful fit.
    #[must_use]
    pub fn fit_report(&self) -> Option<&FitReport> {
        self.report.as_ref()
    }

    /// Warning from the last fit, if it stopped at `max_epochs`.
    #[must_use]
    pub fn convergence_warning(&self) -> Option<&ConvergenceWarning> {
        self.report.as_ref().and_then(|r| r.warning.as_ref())
    }

    /// Predicted strength for (user, item).
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::ColdStart`] for a user or item not seen during
    /// fit, and [`RecomError::NotFitted`] before fit.
    pub fn predict(&self, user: UserId, item: ItemId) -> Result<f32> {
        let artifact = self
            .artifact
            .as_ref()
            .ok_or_else(|| RecomError::not_fitted(self.name()))?;
        let u = *artifact
            .user_index
            .get(&user)
            .ok_or_else(|| RecomError::cold_start_user(user, "MatrixFactorization::predict"))?;
        let i = *artifact
            .item_index
            .get(&item)
            .ok_or_else(|| RecomError::cold_start_item(item, "MatrixFactorization::predict"))?;
        let n = self.config.n_factors;
        Ok(dot(artifact.user_vector(u, n), artifact.item_vector(i, n)))
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
        match &self.artifact {
            Some(artifact) => artifact
                .check_shape(self.config.n_factors)
                .map_err(|detail| RecomError::corrupt_artifact(self.name(), detail)),
            None => Ok(()),
        }
    }

    /// Mean objective per observed interaction.
    fn objective(
        observed: &[(usize, usize, f32)],
        user_factors: &[f32],
        item_factors: &[f32],
        n_factors: usize,
        regularization: f32,
    ) -> f32 {
        let squared_error: f64 = observed
            .iter()
            .map(|&(u, i, r)| {
                let p = &user_factors[u * n_factors..(u + 1) * n_factors];
                let q = &item_factors[i * n_factors..(i + 1) * n_factors];
                f64::from(r - dot(p, q)).powi(2)
            })
            .sum();
        let penalty: f64 = user_factors
            .iter()
            .chain(item_factors)
            .map(|&w| f64::from(w) * f64::from(w))
            .sum();
        ((squared_error + f64::from(regularization) * penalty) / observed.len() as f64) as f32
    }
}

impl Recommender for MatrixFactorization {
    fn name(&self) -> &'static str {
        "MatrixFactorization"
    }

    fn fit(&mut self, train: &InteractionMatrix) -> Result<()> {
        self.config.validate()?;
        if train.is_empty() {
            return Err(RecomError::data(
                "MatrixFactorization: cannot fit on empty training data",
            ));
        }

        let n = self.config.n_factors;
        let lr = self.config.learning_rate;
        let reg = self.config.regularization;

        let user_index: BTreeMap<UserId, usize> =
            train.users().into_iter().enumerate().map(|(i, u)| (u, i)).collect();
        let item_ids = train.items();
        let item_index: BTreeMap<ItemId, usize> =
            item_ids.iter().enumerate().map(|(i, &item)| (item, i)).collect();

        let mut observed: Vec<(usize, usize, f32)> = train
            .iter()
            .map(|i| (user_index[&i.user_id], item_index[&i.item_id], i.value))
            .collect();

        let n_user_params = factor_len(user_index.len(), n)?;
        let n_item_params = factor_len(item_ids.len(), n)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let scale = self.config.init_scale;
        let mut user_factors = init_factors(n_user_params, n, scale, &mut rng)?;
        let mut item_factors = init_factors(n_item_params, n, scale, &mut rng)?;

        let mut previous_loss: Option<f32> = None;
        let mut last_delta = f32::INFINITY;
        let mut loss = f32::INFINITY;
        let mut epochs = 0;
        let mut converged = false;

        for epoch in 1..=self.config.max_epochs {
            observed.shuffle(&mut rng);
            for &(u, i, r) in &observed {
                let (pu, qi) = (u * n, i * n);
                let prediction = dot(&user_factors[pu..pu + n], &item_factors[qi..qi + n]);
                let err = r - prediction;
                for f in 0..n {
                    let p = user_factors[pu + f];
                    let q = item_factors[qi + f];
                    user_factors[pu + f] += lr * (err * q - reg * p);
                    item_factors[qi + f] += lr * (err * p - reg * q);
                }
            }

            loss = Self::objective(&observed, &user_factors, &item_factors, n, reg);
            epochs = epoch;
            if !loss.is_finite() {
                return Err(RecomError::invalid_hyperparameter(
                    "learning_rate",
                    lr,
                    "small enough to keep the loss finite (training diverged)",
                ));
            }
            tracing::debug!(epoch, loss, "factorization epoch");

            if let Some(prev) = previous_loss {
                last_delta = (prev - loss).abs() / prev.max(f32::EPSILON);
                if last_delta < self.config.tolerance {
                    converged = true;
                    break;
                }
            }
            previous_loss = Some(loss);
        }

        let warning = (!converged).then(|| ConvergenceWarning {
            epochs,
            final_loss: loss,
            tolerance: self.config.tolerance,
            last_delta,
        });
        if let Some(w) = &warning {
            tracing::warn!(
                model = self.name(),
                epochs = w.epochs,
                final_loss = w.final_loss,
                last_delta = w.last_delta,
                tolerance = w.tolerance,
                "factorization did not converge; using partially converged factors"
            );
        } else {
            tracing::info!(model = self.name(), epochs, loss, "factorization converged");
        }

        self.artifact = Some(FactorArtifact {
            train: train.clone(),
            user_index,
            item_index,
            item_ids,
            user_factors,
            item_factors,
        });
        self.report = Some(FitReport {
            epochs,
            final_loss: loss,
            converged,
            warning,
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
        let u = *artifact
            .user_index
            .get(&user)
            .ok_or_else(|| RecomError::cold_start_user(user, "MatrixFactorization::recommend"))?;
        if k == 0 {
            return Ok(RecommendationList::empty());
        }

        let n = self.config.n_factors;
        let p = artifact.user_vector(u, n);
        let seen = artifact.train.user_items(user);
        let scores = artifact
            .item_ids
            .iter()
            .enumerate()
            .filter(|&(_, item)| {
                self.config.include_seen || !seen.is_some_and(|s| s.contains_key(item))
            })
            .map(|(idx, &item)| ScoredItem::new(item, dot(p, artifact.item_vector(idx, n))));
        Ok(RecommendationList::top_k(scores, k))
    }
}
