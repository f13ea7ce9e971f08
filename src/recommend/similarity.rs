//! Similarity measures over co-rated entries and neighbourhood construction.
//!
//! Similarities are restricted to the entries two rows have in common
//! (co-rated items for users, co-rating users for items). Pairs with no
//! overlap never get a similarity, which keeps every weighted average
//! well defined.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RecomError, Result};
use crate::interactions::InteractionMatrix;

/// Similarity measure for neighbourhood models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    /// Cosine of the co-rated vectors
    #[default]
    Cosine,
    /// Pearson correlation over co-rated entries
    Pearson,
}

/// Hyperparameters shared by [`super::UserKnn`] and [`super::ItemKnn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnConfig {
    /// Neighbours contributing to each score
    pub k_neighbors: usize,
    /// Similarity measure
    #[serde(default)]
    pub similarity: Similarity,
    /// Minimum co-rated entries for a pair to count as neighbours
    #[serde(default = "default_min_overlap")]
    pub min_overlap: usize,
    /// Allow items already in the user's training data
    #[serde(default)]
    pub include_seen: bool,
}

fn default_min_overlap() -> usize {
    1
}

impl KnnConfig {
    /// Config with the given neighbourhood size and defaults elsewhere.
    #[must_use]
    pub fn new(k_neighbors: usize) -> Self {
        Self {
            k_neighbors,
            similarity: Similarity::default(),
            min_overlap: default_min_overlap(),
            include_seen: false,
        }
    }

    /// Checks hyperparameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::InvalidHyperparameter`] if `k_neighbors` or
    /// `min_overlap` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.k_neighbors == 0 {
            return Err(RecomError::invalid_hyperparameter(
                "k_neighbors",
                self.k_neighbors,
                ">= 1",
            ));
        }
        if self.min_overlap == 0 {
            return Err(RecomError::invalid_hyperparameter(
                "min_overlap",
                self.min_overlap,
                ">= 1",
            ));
        }
        Ok(())
    }
}

/// Cosine similarity of two equally long vectors.
///
/// Returns `None` for empty input or a zero vector.
///
/// # Examples
///
/// ```
/// use recom::recommend::similarity::cosine;
///
/// let s = cosine(&[1.0, 2.0], &[2.0, 4.0]).unwrap();
/// assert!((s - 1.0).abs() < 1e-6);
/// assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), None);
/// ```
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
    let mut stats = CoRatingStats::default();
    for (&x, &y) in a.iter().zip(b) {
        stats.add(x, y);
    }
    stats.similarity(Similarity::Cosine)
}

/// Pearson correlation of two equally long vectors.
///
/// Returns `None` for fewer than two entries or a constant vector.
///
/// # Examples
///
/// ```
/// use recom::recommend::similarity::pearson;
///
/// let s = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
/// assert!((s + 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn pearson(a: &[f32], b: &[f32]) -> Option<f32> {
    let mut stats = CoRatingStats::default();
    for (&x, &y) in a.iter().zip(b) {
        stats.add(x, y);
    }
    stats.similarity(Similarity::Pearson)
}

/// Running sums over co-rated pairs.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CoRatingStats {
    n: usize,
    sum_x: f64,
    sum_y: f64,
    sum_xy: f64,
    sum_xx: f64,
    sum_yy: f64,
}

impl CoRatingStats {
    pub(crate) fn add(&mut self, x: f32, y: f32) {
        let (x, y) = (f64::from(x), f64::from(y));
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xy += x * y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
    }

    pub(crate) fn overlap(&self) -> usize {
        self.n
    }

    pub(crate) fn similarity(&self, measure: Similarity) -> Option<f32> {
        if self.n == 0 {
            return None;
        }
        let value = match measure {
            Similarity::Cosine => {
                let denom = (self.sum_xx * self.sum_yy).sqrt();
                if denom <= f64::EPSILON {
                    return None;
                }
                self.sum_xy / denom
            }
            Similarity::Pearson => {
                if self.n < 2 {
                    return None;
                }
                let n = self.n as f64;
                let cov = n * self.sum_xy - self.sum_x * self.sum_y;
                let var_x = n * self.sum_xx - self.sum_x * self.sum_x;
                let var_y = n * self.sum_yy - self.sum_y * self.sum_y;
                let denom = (var_x * var_y).sqrt();
                if denom <= f64::EPSILON {
                    return None;
                }
                cov / denom
            }
        };
        let value = value.clamp(-1.0, 1.0) as f32;
        value.is_finite().then_some(value)
    }
}

/// Sparse rows: row id → (column id, value), columns ascending.
pub(crate) type Adjacency = BTreeMap<u64, Vec<(u64, f32)>>;

/// User rows (user → items) of an interaction matrix.
pub(crate) fn user_rows(matrix: &InteractionMatrix) -> Adjacency {
    matrix
        .users()
        .into_iter()
        .map(|user| {
            let row = matrix
                .iter_user(user)
                .map(|i| (i.item_id, i.value))
                .collect();
            (user, row)
        })
        .collect()
}

/// Item rows (item → users) of an interaction matrix.
pub(crate) fn item_rows(matrix: &InteractionMatrix) -> Adjacency {
    matrix
        .items()
        .into_iter()
        .map(|item| {
            let row = matrix
                .item_users(item)
                .map(|users| users.iter().map(|(&u, &v)| (u, v)).collect())
                .unwrap_or_default();
            (item, row)
        })
        .collect()
}

/// Similarity row of one entity: (neighbour id, similarity), best first.
pub(crate) type NeighbourRow = Vec<(u64, f32)>;

/// True if every stored similarity is finite and positive.
pub(crate) fn rows_well_formed(rows: &BTreeMap<u64, NeighbourRow>) -> bool {
    rows.values()
        .flatten()
        .all(|&(_, sim)| sim.is_finite() && sim > 0.0)
}

/// Computes the neighbour row of every entry in `rows`.
///
/// `columns` is the transpose of `rows`. For row `a`, co-rating statistics
/// against every row sharing a column are accumulated by walking `a`'s
/// columns and each column's rows. Only positive similarities with at least
/// `min_overlap` shared columns are kept. Rows are sorted by similarity
/// descending, then id ascending.
///
/// Each row is computed independently, so the parallel and sequential paths
/// produce identical output.
pub(crate) fn neighbour_rows(
    rows: &Adjacency,
    columns: &Adjacency,
    measure: Similarity,
    min_overlap: usize,
) -> BTreeMap<u64, NeighbourRow> {
    let row_ids: Vec<u64> = rows.keys().copied().collect();

    #[cfg(feature = "parallel")]
    let computed: Vec<(u64, NeighbourRow)> = {
        use rayon::prelude::*;
        row_ids
            .par_iter()
            .map(|&id| (id, neighbour_row(id, rows, columns, measure, min_overlap)))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let computed: Vec<(u64, NeighbourRow)> = row_ids
        .iter()
        .map(|&id| (id, neighbour_row(id, rows, columns, measure, min_overlap)))
        .collect();

    computed.into_iter().collect()
}

/// Neighbour row of a single entity.
pub(crate) fn neighbour_row(
    id: u64,
    rows: &Adjacency,
    columns: &Adjacency,
    measure: Similarity,
    min_overlap: usize,
) -> NeighbourRow {
    let mut stats: BTreeMap<u64, CoRatingStats> = BTreeMap::new();
    if let Some(entries) = rows.get(&id) {
        for &(column, x) in entries {
            let Some(others) = columns.get(&column) else {
                continue;
            };
            for &(other, y) in others {
                if other != id {
                    stats.entry(other).or_default().add(x, y);
                }
            }
        }
    }

    let mut row: NeighbourRow = stats
        .into_iter()
        .filter(|(_, s)| s.overlap() >= min_overlap)
        .filter_map(|(other, s)| s.similarity(measure).map(|sim| (other, sim)))
        .filter(|&(_, sim)| sim > 0.0)
        .collect();
    row.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    row
}
