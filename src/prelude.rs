//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use recom::prelude::*;
//! ```

pub use crate::config::{EvaluationConfig, ModelConfig, PipelineConfig, SplitConfig};
pub use crate::error::{ConvergenceWarning, RecomError, Result};
pub use crate::interactions::{Interaction, InteractionMatrix, InteractionRecord, ItemId, UserId};
pub use crate::metrics::{EvaluationReport, Evaluator, UserMetrics};
pub use crate::model_selection::{RandomSplit, Split, SplitStrategy, TemporalSplit};
pub use crate::pipeline::{Pipeline, PipelineOutcome};
pub use crate::recommend::{
    FactorizationConfig, ItemKnn, KnnConfig, MatrixFactorization, Popularity,
    RecommendationList, RecommenderModel, ScoredItem, Similarity, UserKnn,
};
pub use crate::traits::Recommender;
