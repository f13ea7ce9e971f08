//! Pipeline configuration.
//!
//! A [`PipelineConfig`] describes one experiment: how to split the data,
//! which recommender to fit and how to score it. It deserializes from TOML:
//!
//! ```toml
//! [split]
//! kind = "random"
//! train_fraction = 0.8
//! seed = 42
//!
//! [model]
//! kind = "user_knn"
//! k_neighbors = 20
//! similarity = "pearson"
//!
//! [evaluation]
//! k = 10
//! relevance_threshold = 4.0
//! ```
//!
//! Every numeric hyperparameter that shapes results (`train_fraction`,
//! `k_neighbors`, `n_factors`, `max_epochs`, `k`) must be given explicitly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RecomError, Result};
use crate::interactions::InteractionMatrix;
use crate::model_selection::{RandomSplit, Split, SplitStrategy, TemporalSplit};
use crate::recommend::{FactorizationConfig, KnnConfig};

/// How to divide interactions into train and test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitConfig {
    /// Seeded per-user random hold-out
    Random {
        /// Fraction of each user's interactions kept for training
        train_fraction: f32,
        /// Generator seed
        #[serde(default)]
        seed: u64,
    },
    /// Per-user hold-out of the most recent interactions
    Temporal {
        /// Fraction of each user's interactions kept for training
        train_fraction: f32,
    },
}

impl SplitConfig {
    fn train_fraction(&self) -> f32 {
        match self {
            Self::Random { train_fraction, .. } | Self::Temporal { train_fraction } => {
                *train_fraction
            }
        }
    }

    /// Runs the configured split.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`RandomSplit`] or [`TemporalSplit`].
    pub fn split(&self, data: &InteractionMatrix) -> Result<Split> {
        match *self {
            Self::Random {
                train_fraction,
                seed,
            } => RandomSplit::new(train_fraction, seed).split(data),
            Self::Temporal { train_fraction } => TemporalSplit::new(train_fraction).split(data),
        }
    }
}

/// Which recommender to build, with its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    /// User-based k-nearest neighbours
    UserKnn(KnnConfig),
    /// Item-based k-nearest neighbours
    ItemKnn(KnnConfig),
    /// SGD matrix factorization
    Factorization(FactorizationConfig),
    /// Item popularity
    Popularity {
        /// Allow already-seen items
        #[serde(default)]
        include_seen: bool,
    },
}

impl ModelConfig {
    /// Checks the variant's hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::InvalidHyperparameter`] for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::UserKnn(knn) | Self::ItemKnn(knn) => knn.validate(),
            Self::Factorization(mf) => mf.validate(),
            Self::Popularity { .. } => Ok(()),
        }
    }
}

/// Evaluation cutoff and relevance rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Ranking cutoff
    pub k: usize,
    /// Minimum test value counted as relevant; absent means any interaction
    #[serde(default)]
    pub relevance_threshold: Option<f32>,
}

/// One experiment: split, model and evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Train/test split
    pub split: SplitConfig,
    /// Recommender and hyperparameters
    pub model: ModelConfig,
    /// Scoring
    pub evaluation: EvaluationConfig,
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Config`] for malformed TOML or missing fields and
    /// the [`PipelineConfig::validate`] errors for out-of-range values.
    ///
    /// # Examples
    ///
    /// ```
    /// use recom::config::{ModelConfig, PipelineConfig};
    ///
    /// let config = PipelineConfig::from_toml_str(r#"
    ///     [split]
    ///     kind = "temporal"
    ///     train_fraction = 0.8
    ///
    ///     [model]
    ///     kind = "popularity"
    ///
    ///     [evaluation]
    ///     k = 5
    /// "#).expect("valid config");
    ///
    /// assert_eq!(config.evaluation.k, 5);
    /// assert!(matches!(config.model, ModelConfig::Popularity { .. }));
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Io`] if the file cannot be read, otherwise as
    /// [`PipelineConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading pipeline config");
        Self::from_toml_str(&text)
    }

    /// Renders the config back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| RecomError::Config(e.to_string()))
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::InvalidHyperparameter`] naming the first bad
    /// value.
    pub fn validate(&self) -> Result<()> {
        let fraction = self.split.train_fraction();
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(RecomError::invalid_hyperparameter(
                "train_fraction",
                fraction,
                "0 < train_fraction < 1",
            ));
        }
        self.model.validate()?;
        if self.evaluation.k == 0 {
            return Err(RecomError::invalid_hyperparameter("k", self.evaluation.k, ">= 1"));
        }
        if let Some(t) = self.evaluation.relevance_threshold {
            if !t.is_finite() {
                return Err(RecomError::invalid_hyperparameter(
                    "relevance_threshold",
                    t,
                    "finite",
                ));
            }
        }
        Ok(())
    }
}
