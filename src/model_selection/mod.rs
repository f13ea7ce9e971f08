//! Train/test splitting of interaction data.
//!
//! This module provides:
//! - [`RandomSplit`]: seeded per-user random hold-out
//! - [`TemporalSplit`]: per-user hold-out of the most recent interactions
//!
//! Both split each user's interactions independently, so every user that
//! appears in the test half also has at least one training interaction.
//! Users with fewer than two interactions stay entirely in train and are
//! reported in [`Split::skipped`].

use serde::{Deserialize, Serialize};

use crate::error::{RecomError, Result};
use crate::interactions::{Interaction, InteractionMatrix, UserId};

/// Minimum interactions a user needs to contribute to both halves.
pub const MIN_INTERACTIONS_PER_USER: usize = 2;

/// Result of splitting an [`InteractionMatrix`].
#[derive(Debug)]
pub struct Split {
    /// Training interactions
    pub train: InteractionMatrix,
    /// Held-out interactions
    pub test: InteractionMatrix,
    /// Users kept out of the test half, one
    /// [`RecomError::InsufficientData`] each
    pub skipped: Vec<RecomError>,
}

impl Split {
    /// Users with at least one held-out interaction, ascending.
    #[must_use]
    pub fn test_users(&self) -> Vec<UserId> {
        self.test.users()
    }

    /// Ids of users reported in [`Split::skipped`].
    #[must_use]
    pub fn skipped_users(&self) -> Vec<UserId> {
        self.skipped
            .iter()
            .filter_map(|err| match err {
                RecomError::InsufficientData { user, .. } => Some(*user),
                _ => None,
            })
            .collect()
    }
}

/// A policy for partitioning interactions into train and test.
pub trait SplitStrategy {
    /// Partition `data`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or input the strategy
    /// cannot work with (e.g. missing timestamps). Users with too few
    /// interactions are not errors; see [`Split::skipped`].
    fn split(&self, data: &InteractionMatrix) -> Result<Split>;
}

/// Validates a train fraction.
fn validate_train_fraction(train_fraction: f32) -> Result<()> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(RecomError::invalid_hyperparameter(
            "train_fraction",
            train_fraction,
            "in (0, 1)",
        ));
    }
    Ok(())
}

/// Number of a user's `n` interactions that go to test.
///
/// Always leaves at least one interaction on each side; `n` must be at
/// least [`MIN_INTERACTIONS_PER_USER`].
fn n_test_for(n: usize, train_fraction: f32) -> usize {
    let raw = (n as f32 * (1.0 - train_fraction)).round() as usize;
    raw.clamp(1, n - 1)
}

fn insufficient(user: UserId, interactions: usize, operation: &str) -> RecomError {
    RecomError::InsufficientData {
        user,
        interactions,
        required: MIN_INTERACTIONS_PER_USER,
        operation: operation.to_string(),
    }
}

/// Assembles the two halves from per-user interactions.
///
/// `order` rearranges each user's interactions; the leading `n_test` of the
/// result are held out.
fn assemble<F>(
    data: &InteractionMatrix,
    operation: &str,
    mut order: F,
    train_fraction: f32,
) -> Split
where
    F: FnMut(&mut Vec<Interaction>),
{
    let mut train = InteractionMatrix::new();
    let mut test = InteractionMatrix::new();
    let mut skipped = Vec::new();

    for user in data.users() {
        let mut interactions: Vec<Interaction> = data.iter_user(user).collect();
        let n = interactions.len();

        if n < MIN_INTERACTIONS_PER_USER {
            tracing::debug!(user, n, operation, "user kept out of test half");
            skipped.push(insufficient(user, n, operation));
            for interaction in interactions {
                train.insert_unchecked(interaction);
            }
            continue;
        }

        order(&mut interactions);
        let n_test = n_test_for(n, train_fraction);
        let (held_out, kept) = interactions.split_at(n_test);
        for &interaction in held_out {
            test.insert_unchecked(interaction);
        }
        for &interaction in kept {
            train.insert_unchecked(interaction);
        }
    }

    tracing::info!(
        operation,
        n_train = train.len(),
        n_test = test.len(),
        n_test_users = test.n_users(),
        n_skipped = skipped.len(),
        "interactions split"
    );

    Split {
        train,
        test,
        skipped,
    }
}

/// Seeded random per-user hold-out.
///
/// Users are visited in ascending id order and every user's items are
/// shuffled with one generator seeded from `seed`, so the same seed on the
/// same data always yields the same split.
///
/// # Example
///
/// ```rust
/// use recom::interactions::{InteractionMatrix, InteractionRecord};
/// use recom::model_selection::{RandomSplit, SplitStrategy};
///
/// let records = (1..=4).map(|item| InteractionRecord::new(1, item, item as f32));
/// let data = InteractionMatrix::load(records).expect("valid records");
///
/// let split = RandomSplit::new(0.75, 42).split(&data).expect("valid split");
/// assert_eq!(split.train.len(), 3);
/// assert_eq!(split.test.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSplit {
    /// Fraction of each user's interactions kept for training
    pub train_fraction: f32,
    /// Generator seed
    pub seed: u64,
}

impl RandomSplit {
    /// Create a random split.
    #[must_use]
    pub fn new(train_fraction: f32, seed: u64) -> Self {
        Self {
            train_fraction,
            seed,
        }
    }
}

impl SplitStrategy for RandomSplit {
    fn split(&self, data: &InteractionMatrix) -> Result<Split> {
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        validate_train_fraction(self.train_fraction)?;
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.seed);
        Ok(assemble(
            data,
            "random split",
            |interactions| interactions.shuffle(&mut rng),
            self.train_fraction,
        ))
    }
}

/// Per-user hold-out of the most recent interactions.
///
/// Each user's interactions are ordered by (timestamp, item id) and the last
/// `1 - train_fraction` of them go to test. Every interaction must carry a
/// timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSplit {
    /// Fraction of each user's interactions kept for training
    pub train_fraction: f32,
}

impl TemporalSplit {
    /// Create a temporal split.
    #[must_use]
    pub fn new(train_fraction: f32) -> Self {
        Self { train_fraction }
    }
}

impl SplitStrategy for TemporalSplit {
    fn split(&self, data: &InteractionMatrix) -> Result<Split> {
        validate_train_fraction(self.train_fraction)?;

        if let Some(missing) = data.iter().find(|i| i.timestamp.is_none()) {
            return Err(RecomError::data(format!(
                "temporal split requires timestamps: user {}, item {} has none",
                missing.user_id, missing.item_id
            )));
        }

        Ok(assemble(
            data,
            "temporal split",
            |interactions| {
                // Most recent first, so the leading slice is the held-out tail.
                interactions.sort_by(|a, b| {
                    b.timestamp
                        .cmp(&a.timestamp)
                        .then_with(|| b.item_id.cmp(&a.item_id))
                });
            },
            self.train_fraction,
        ))
    }
}


#[cfg(test)]
#[path = "tests_split_contract.rs"]
mod tests_split_contract;
