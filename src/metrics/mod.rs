//! Evaluation metrics for recommenders.
//!
//! Ranking metrics (precision@K, recall@K, Hit@K, MRR, NDCG) live in
//! [`ranking`]; [`Evaluator`] applies them per user against a held-out test
//! set and macro-averages the result into an [`EvaluationReport`].

pub mod evaluator;
pub mod ranking;

pub use evaluator::{EvaluationReport, Evaluator, UserMetrics};

#[cfg(test)]
#[path = "tests_ranking_contract.rs"]
mod tests_ranking_contract;
