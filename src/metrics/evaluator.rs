//! Offline evaluation of recommenders against held-out interactions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ranking;
use crate::config::EvaluationConfig;
use crate::error::{RecomError, Result};
use crate::interactions::{InteractionMatrix, ItemId, UserId};
use crate::recommend::RecommendationList;
use crate::traits::Recommender;

/// Metrics for one evaluated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    /// Precision@K
    pub precision: f32,
    /// Recall@K
    pub recall: f32,
    /// Hit@K
    pub hit: f32,
    /// Reciprocal rank within the top K
    pub reciprocal_rank: f32,
    /// Binary NDCG@K
    pub ndcg: f32,
    /// Relevant test items for this user
    pub n_relevant: usize,
}

/// Macro-averaged metrics over all evaluated users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Ranking cutoff
    pub k: usize,
    /// Per-user breakdown
    pub per_user: BTreeMap<UserId, UserMetrics>,
    /// Mean precision@K
    pub precision: f32,
    /// Mean recall@K
    pub recall: f32,
    /// Share of users with at least one hit
    pub hit_rate: f32,
    /// Mean reciprocal rank
    pub mrr: f32,
    /// Mean NDCG@K
    pub ndcg: f32,
    /// Users evaluated
    pub n_users: usize,
    /// Test users the model could not score
    pub cold_start_users: Vec<UserId>,
}

impl EvaluationReport {
    fn aggregate(k: usize, per_user: BTreeMap<UserId, UserMetrics>) -> Self {
        let n_users = per_user.len();
        let mean = |f: fn(&UserMetrics) -> f32| {
            if n_users == 0 {
                0.0
            } else {
                let total: f64 = per_user.values().map(|m| f64::from(f(m))).sum();
                (total / n_users as f64) as f32
            }
        };
        Self {
            k,
            precision: mean(|m| m.precision),
            recall: mean(|m| m.recall),
            hit_rate: mean(|m| m.hit),
            mrr: mean(|m| m.reciprocal_rank),
            ndcg: mean(|m| m.ndcg),
            n_users,
            per_user,
            cold_start_users: Vec::new(),
        }
    }

    /// Generate a formatted report string.
    #[must_use]
    pub fn report(&self) -> String {
        format!(
            "Ranking Metrics (n={}, k={})\n\
             ─────────────────────────\n\
             Precision@{k}: {:>6.3}\n\
             Recall@{k}:    {:>6.3}\n\
             Hit rate:     {:>6.1}%\n\
             MRR:          {:>6.3}\n\
             NDCG@{k}:      {:>6.3}\n\
             Cold start:   {:>6}",
            self.n_users,
            self.k,
            self.precision,
            self.recall,
            self.hit_rate * 100.0,
            self.mrr,
            self.ndcg,
            self.cold_start_users.len(),
            k = self.k,
        )
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

/// Scores ranked lists against a test set.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use recom::prelude::*;
///
/// let test = InteractionMatrix::load(vec![
///     InteractionRecord::new(1, 10, 5.0),
///     InteractionRecord::new(1, 11, 2.0),
/// ]).expect("valid records");
///
/// let mut recs = BTreeMap::new();
/// recs.insert(1, RecommendationList::top_k(vec![
///     ScoredItem::new(10, 0.9),
///     ScoredItem::new(12, 0.5),
/// ], 2));
///
/// let report = Evaluator::new(2)
///     .with_relevance_threshold(4.0)
///     .score(&recs, &test)
///     .expect("k > 0");
/// assert!((report.precision - 0.5).abs() < 1e-6);
/// assert!((report.recall - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluator {
    k: usize,
    relevance_threshold: Option<f32>,
}

impl Evaluator {
    /// Evaluate the top `k` of each list; every test interaction is relevant.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            relevance_threshold: None,
        }
    }

    /// Build from the `[evaluation]` config section.
    #[must_use]
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            k: config.k,
            relevance_threshold: config.relevance_threshold,
        }
    }

    /// Count only test interactions with value ≥ `threshold` as relevant.
    ///
    /// A non-finite threshold is rejected when scoring.
    #[must_use]
    pub fn with_relevance_threshold(mut self, threshold: f32) -> Self {
        self.relevance_threshold = Some(threshold);
        self
    }

    /// Ranking cutoff.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    fn check_settings(&self) -> Result<()> {
        if self.k == 0 {
            return Err(RecomError::data("evaluation requires k >= 1"));
        }
        if let Some(threshold) = self.relevance_threshold {
            if !threshold.is_finite() {
                return Err(RecomError::data(format!(
                    "relevance threshold must be finite, got {threshold}"
                )));
            }
        }
        Ok(())
    }

    fn relevant_items(&self, test: &InteractionMatrix, user: UserId) -> BTreeSet<ItemId> {
        test.user_items(user)
            .map(|items| {
                items
                    .iter()
                    .filter(|(_, e)| self.relevance_threshold.map_or(true, |t| e.value >= t))
                    .map(|(&item, _)| item)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Scores precomputed lists.
    ///
    /// Users with no relevant test item are left out. A user with no entry
    /// in `recommendations` scores zero on every metric.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Data`] when `k` is zero or the relevance
    /// threshold is not finite.
    pub fn score(
        &self,
        recommendations: &BTreeMap<UserId, RecommendationList>,
        test: &InteractionMatrix,
    ) -> Result<EvaluationReport> {
        self.check_settings()?;

        let mut per_user = BTreeMap::new();
        for user in test.users() {
            let relevant = self.relevant_items(test, user);
            if relevant.is_empty() {
                continue;
            }
            let ranked: Vec<ItemId> = recommendations
                .get(&user)
                .map(|list| list.iter().take(self.k).map(|s| s.item).collect())
                .unwrap_or_default();
            per_user.insert(
                user,
                UserMetrics {
                    precision: ranking::precision_at_k(&ranked, &relevant, self.k)?,
                    recall: ranking::recall_at_k(&ranked, &relevant, self.k),
                    hit: ranking::hit_at_k(&ranked, &relevant, self.k),
                    reciprocal_rank: ranking::reciprocal_rank(&ranked, &relevant),
                    ndcg: ranking::ndcg_at_k(&ranked, &relevant, self.k),
                    n_relevant: relevant.len(),
                },
            );
        }

        let report = EvaluationReport::aggregate(self.k, per_user);
        tracing::info!(
            k = self.k,
            n_users = report.n_users,
            precision = report.precision,
            recall = report.recall,
            ndcg = report.ndcg,
            "evaluation complete"
        );
        Ok(report)
    }

    /// Recommends for every test user with `model`, then scores.
    ///
    /// Cold-start users are listed in
    /// [`EvaluationReport::cold_start_users`] and score zero.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Data`] when `k` is zero or the relevance
    /// threshold is not finite, and propagates any recommend error other
    /// than cold start.
    pub fn evaluate<M>(&self, model: &M, test: &InteractionMatrix) -> Result<EvaluationReport>
    where
        M: Recommender + Sync,
    {
        self.check_settings()?;

        let users = test.users();
        let mut recommendations = BTreeMap::new();
        let mut cold_start_users = Vec::new();
        for (user, outcome) in model.recommend_many(&users, self.k) {
            match outcome {
                Ok(list) => {
                    recommendations.insert(user, list);
                }
                Err(err) if err.is_cold_start() => {
                    tracing::debug!(user, model = model.name(), "cold-start user in test set");
                    cold_start_users.push(user);
                }
                Err(err) => return Err(err),
            }
        }

        let mut report = self.score(&recommendations, test)?;
        if !cold_start_users.is_empty() {
            tracing::warn!(
                n_cold_start = cold_start_users.len(),
                model = model.name(),
                "test users unseen in training scored as zero"
            );
        }
        report.cold_start_users = cold_start_users;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactions::InteractionRecord;
    use crate::recommend::{ScoredItem, UserKnn};

    fn list(items: &[ItemId]) -> RecommendationList {
        let n = items.len();
        RecommendationList::top_k(
            items
                .iter()
                .enumerate()
                .map(|(rank, &item)| ScoredItem::new(item, (n - rank) as f32)),
            n,
        )
    }

    fn test_set() -> InteractionMatrix {
        InteractionMatrix::load(vec![
            InteractionRecord::new(1, 10, 5.0),
            InteractionRecord::new(1, 11, 4.0),
            InteractionRecord::new(2, 20, 5.0),
            InteractionRecord::new(3, 30, 1.0),
        ])
        .expect("valid records")
    }

    #[test]
    fn test_score_macro_average() {
        let mut recs = BTreeMap::new();
        recs.insert(1, list(&[10, 99]));
        recs.insert(2, list(&[98, 97]));
        recs.insert(3, list(&[30, 96]));

        let report = Evaluator::new(2).score(&recs, &test_set()).expect("k > 0");
        assert_eq!(report.n_users, 3);
        // precision: (1/2 + 0 + 1/2) / 3
        assert!((report.precision - 1.0 / 3.0).abs() < 1e-6);
        // recall: (1/2 + 0 + 1) / 3
        assert!((report.recall - 0.5).abs() < 1e-6);
        assert!((report.hit_rate - 2.0 / 3.0).abs() < 1e-6);
        assert!((report.mrr - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_excludes_users_without_relevant_items() {
        let mut recs = BTreeMap::new();
        recs.insert(3, list(&[30]));
        let report = Evaluator::new(1)
            .with_relevance_threshold(4.0)
            .score(&recs, &test_set())
            .expect("k > 0");
        // User 3 only has a 1.0 interaction
        assert!(!report.per_user.contains_key(&3));
        assert_eq!(report.n_users, 2);
    }

    #[test]
    fn test_missing_user_scores_zero() {
        let report = Evaluator::new(3)
            .score(&BTreeMap::new(), &test_set())
            .expect("k > 0");
        assert_eq!(report.n_users, 3);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
    }

    #[test]
    fn test_k_zero_is_data_error() {
        let err = Evaluator::new(0)
            .score(&BTreeMap::new(), &test_set())
            .expect_err("k = 0");
        assert!(matches!(err, RecomError::Data { .. }));
    }

    #[test]
    fn test_empty_test_set_gives_zero_aggregates() {
        let report = Evaluator::new(5)
            .score(&BTreeMap::new(), &InteractionMatrix::new())
            .expect("k > 0");
        assert_eq!(report.n_users, 0);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.ndcg, 0.0);
    }

    #[test]
    fn test_evaluate_counts_cold_start_users() {
        let train = InteractionMatrix::load(vec![
            InteractionRecord::new(1, 20, 5.0),
            InteractionRecord::new(1, 10, 4.0),
            InteractionRecord::new(2, 20, 5.0),
        ])
        .expect("valid records");
        let mut model = UserKnn::new(2);
        model.fit(&train).expect("fit");

        let test = InteractionMatrix::load(vec![
            InteractionRecord::new(2, 10, 5.0),
            InteractionRecord::new(7, 10, 5.0),
        ])
        .expect("valid records");
        let report = Evaluator::new(1).evaluate(&model, &test).expect("fitted");
        assert_eq!(report.cold_start_users, vec![7]);
        assert_eq!(report.n_users, 2);
        assert_eq!(report.per_user[&2].hit, 1.0);
        assert_eq!(report.per_user[&7].hit, 0.0);
    }

    #[test]
    fn test_evaluate_propagates_not_fitted() {
        let model = UserKnn::new(2);
        let err = Evaluator::new(1)
            .evaluate(&model, &test_set())
            .expect_err("unfitted");
        assert!(matches!(err, RecomError::NotFitted { .. }));
    }

    #[test]
    fn test_non_finite_threshold_is_data_error() {
        let mut recs = BTreeMap::new();
        recs.insert(1, list(&[10, 11]));
        for threshold in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let evaluator = Evaluator::new(2).with_relevance_threshold(threshold);
            let err = evaluator
                .score(&recs, &test_set())
                .expect_err("non-finite threshold");
            assert!(matches!(err, RecomError::Data { .. }));
            assert!(err.to_string().contains("relevance threshold"));

            let err = evaluator
                .evaluate(&UserKnn::new(2), &test_set())
                .expect_err("rejected before recommending");
            assert!(matches!(err, RecomError::Data { .. }));
        }
    }

    #[test]
    fn test_report_text() {
        let mut recs = BTreeMap::new();
        recs.insert(1, list(&[10, 11]));
        let report = Evaluator::new(2).score(&recs, &test_set()).expect("k > 0");
        let text = report.report();
        assert!(text.contains("Precision@2"));
        assert!(text.contains("NDCG@2"));
        assert_eq!(text, report.to_string());
    }
}
