//! End-to-end experiment runner.
//!
//! [`Pipeline::run`] performs load, split, build, fit and evaluate in that
//! order, driven entirely by a [`PipelineConfig`].

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::interactions::{InteractionMatrix, InteractionRecord};
use crate::metrics::{EvaluationReport, Evaluator};
use crate::model_selection::Split;
use crate::recommend::RecommenderModel;
use crate::traits::Recommender;

/// Everything produced by one pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Fitted model, ready to serve or persist
    pub model: RecommenderModel,
    /// Train/test partition, including users skipped by the split
    pub split: Split,
    /// Test-set metrics
    pub report: EvaluationReport,
}

/// Runs one configured experiment.
///
/// # Examples
///
/// ```
/// use recom::config::PipelineConfig;
/// use recom::interactions::InteractionRecord;
/// use recom::pipeline::Pipeline;
///
/// let config = PipelineConfig::from_toml_str(r#"
///     [split]
///     kind = "random"
///     train_fraction = 0.75
///     seed = 42
///
///     [model]
///     kind = "popularity"
///
///     [evaluation]
///     k = 2
/// "#).expect("valid config");
///
/// let records = (1..=3u64).flat_map(|user| {
///     (1..=4u64).map(move |item| InteractionRecord::new(user, item, (user + item) as f32))
/// });
///
/// let outcome = Pipeline::new(config).run(records).expect("pipeline");
/// assert_eq!(outcome.split.test.len(), 3);
/// assert_eq!(outcome.report.n_users, 3);
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Wrap a config.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The driving config.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loads `records` and runs the experiment.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal error of any stage: invalid records or
    /// config, a split failure, a fit failure, or an evaluation failure.
    /// Per-user [`crate::error::RecomError::InsufficientData`] from the split
    /// is not fatal; it is reported in [`Split::skipped`].
    pub fn run<I>(&self, records: I) -> Result<PipelineOutcome>
    where
        I: IntoIterator<Item = InteractionRecord>,
    {
        self.config.validate()?;
        let data = InteractionMatrix::load(records)?;
        self.run_matrix(&data)
    }

    /// Runs the experiment on already-loaded interactions.
    ///
    /// # Errors
    ///
    /// As [`Pipeline::run`], minus record validation.
    pub fn run_matrix(&self, data: &InteractionMatrix) -> Result<PipelineOutcome> {
        self.config.validate()?;
        let split = self.config.split.split(data)?;

        let mut model = RecommenderModel::from_config(&self.config.model);
        model.fit(&split.train)?;

        let report = Evaluator::from_config(&self.config.evaluation).evaluate(&model, &split.test)?;
        tracing::info!(
            model = model.name(),
            n_train = split.train.len(),
            n_test = split.test.len(),
            n_skipped = split.skipped.len(),
            precision = report.precision,
            recall = report.recall,
            "pipeline finished"
        );

        Ok(PipelineOutcome {
            model,
            split,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvaluationConfig, ModelConfig, SplitConfig};
    use crate::error::RecomError;
    use crate::recommend::KnnConfig;

    fn config(model: ModelConfig) -> PipelineConfig {
        PipelineConfig {
            split: SplitConfig::Random {
                train_fraction: 0.75,
                seed: 42,
            },
            model,
            evaluation: EvaluationConfig {
                k: 2,
                relevance_threshold: None,
            },
        }
    }

    fn records() -> Vec<InteractionRecord> {
        let mut out = Vec::new();
        for user in 1..=5u64 {
            for item in 1..=6u64 {
                if (user * item) % 4 != 0 {
                    out.push(InteractionRecord::new(user, item, ((user + item) % 5 + 1) as f32));
                }
            }
        }
        // Single-interaction user stays in train only
        out.push(InteractionRecord::new(9, 1, 3.0));
        out
    }

    #[test]
    fn test_run_user_knn() {
        let outcome = Pipeline::new(config(ModelConfig::UserKnn(KnnConfig::new(2))))
            .run(records())
            .expect("pipeline");
        assert!(outcome.model.is_fitted());
        assert_eq!(outcome.split.skipped_users(), vec![9]);
        assert!(outcome.split.test.users().iter().all(|&u| u != 9));
        assert!(outcome.report.precision >= 0.0 && outcome.report.precision <= 1.0);
        assert!(outcome.report.cold_start_users.is_empty());
    }

    #[test]
    fn test_run_is_deterministic() {
        let pipeline = Pipeline::new(config(ModelConfig::ItemKnn(KnnConfig::new(3))));
        let a = pipeline.run(records()).expect("pipeline");
        let b = pipeline.run(records()).expect("pipeline");
        assert_eq!(a.model, b.model);
        assert_eq!(a.report, b.report);
        assert_eq!(a.split.test, b.split.test);
    }

    #[test]
    fn test_invalid_record_is_fatal() {
        let mut bad = records();
        bad.push(InteractionRecord {
            user_id: None,
            item_id: Some(1),
            value: 1.0,
            timestamp: None,
        });
        let err = Pipeline::new(config(ModelConfig::Popularity {
            include_seen: false,
        }))
        .run(bad)
        .expect_err("missing user id");
        assert!(matches!(err, RecomError::Data { .. }));
    }

    #[test]
    fn test_temporal_split_without_timestamps_is_fatal() {
        let mut cfg = config(ModelConfig::Popularity {
            include_seen: false,
        });
        cfg.split = SplitConfig::Temporal {
            train_fraction: 0.5,
        };
        assert!(Pipeline::new(cfg).run(records()).is_err());
    }
}
