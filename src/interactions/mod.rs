//! Sparse user–item interaction storage.
//!
//! [`InteractionMatrix`] keeps a forward index (user → item → entry) and an
//! inverse index (item → user → value). Both are ordered maps, so every
//! iteration is in ascending id order and downstream splits and evaluations
//! are reproducible.
//!
//! # Quick Start
//!
//! ```
//! use recom::interactions::{InteractionMatrix, InteractionRecord};
//!
//! let records = vec![
//!     InteractionRecord::new(1, 10, 4.0),
//!     InteractionRecord::new(1, 11, 2.0),
//!     InteractionRecord::new(2, 10, 5.0),
//!     InteractionRecord::new(1, 10, 3.0), // re-ingested: last write wins
//! ];
//!
//! let matrix = InteractionMatrix::load(records).expect("valid records");
//! assert_eq!(matrix.len(), 3);
//! assert_eq!(matrix.get(1, 10), Some(3.0));
//! assert_eq!(matrix.get(2, 11), None);
//! assert_eq!(matrix.users(), vec![1, 2]);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RecomError, Result};

/// User identifier.
pub type UserId = u64;

/// Item identifier.
pub type ItemId = u64;

/// Raw interaction as supplied by an external data source.
///
/// Ids are optional so that incomplete rows can be rejected with a
/// [`RecomError::Data`] naming the missing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// User id, if present
    pub user_id: Option<UserId>,
    /// Item id, if present
    pub item_id: Option<ItemId>,
    /// Rating or implicit strength
    pub value: f32,
    /// Optional ordering key
    pub timestamp: Option<i64>,
}

impl InteractionRecord {
    /// Complete record without a timestamp.
    #[must_use]
    pub fn new(user_id: UserId, item_id: ItemId, value: f32) -> Self {
        Self {
            user_id: Some(user_id),
            item_id: Some(item_id),
            value,
            timestamp: None,
        }
    }

    /// Attach a timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    fn validate(&self, index: usize) -> Result<Interaction> {
        let user_id = self
            .user_id
            .ok_or_else(|| RecomError::data(format!("record {index}: missing user_id")))?;
        let item_id = self
            .item_id
            .ok_or_else(|| RecomError::data(format!("record {index}: missing item_id")))?;
        if !self.value.is_finite() {
            return Err(RecomError::data(format!(
                "record {index}: non-finite value {} for user {user_id}, item {item_id}",
                self.value
            )));
        }
        Ok(Interaction {
            user_id,
            item_id,
            value: self.value,
            timestamp: self.timestamp,
        })
    }
}

/// A validated interaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// User id
    pub user_id: UserId,
    /// Item id
    pub item_id: ItemId,
    /// Rating or implicit strength
    pub value: f32,
    /// Optional ordering key
    pub timestamp: Option<i64>,
}

impl Interaction {
    /// Interaction without a timestamp.
    #[must_use]
    pub fn new(user_id: UserId, item_id: ItemId, value: f32) -> Self {
        Self {
            user_id,
            item_id,
            value,
            timestamp: None,
        }
    }

    /// Attach a timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Stored value of one (user, item) cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Rating or implicit strength
    pub value: f32,
    /// Optional ordering key
    pub timestamp: Option<i64>,
}

/// Sparse user–item interaction matrix.
///
/// Memory is proportional to the number of observed interactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionMatrix {
    by_user: BTreeMap<UserId, BTreeMap<ItemId, Entry>>,
    by_item: BTreeMap<ItemId, BTreeMap<UserId, f32>>,
    len: usize,
}

impl InteractionMatrix {
    /// Empty matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and load raw records.
    ///
    /// Duplicate (user, item) pairs keep the last record.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Data`] if a record lacks a user or item id or
    /// carries a non-finite value.
    pub fn load<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = InteractionRecord>,
    {
        let mut matrix = Self::new();
        let mut n_records = 0usize;
        for (index, record) in records.into_iter().enumerate() {
            matrix.insert_unchecked(record.validate(index)?);
            n_records += 1;
        }
        tracing::debug!(
            n_records,
            n_interactions = matrix.len(),
            n_users = matrix.n_users(),
            n_items = matrix.n_items(),
            "interaction matrix loaded"
        );
        Ok(matrix)
    }

    /// Build from already validated interactions.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Data`] on a non-finite value.
    pub fn from_interactions<I>(interactions: I) -> Result<Self>
    where
        I: IntoIterator<Item = Interaction>,
    {
        let mut matrix = Self::new();
        for interaction in interactions {
            matrix.insert(interaction)?;
        }
        Ok(matrix)
    }

    /// Insert or overwrite one interaction, keeping both indices mirrored.
    ///
    /// # Errors
    ///
    /// Returns [`RecomError::Data`] on a non-finite value; the matrix is left
    /// unchanged.
    pub fn insert(&mut self, interaction: Interaction) -> Result<()> {
        if !interaction.value.is_finite() {
            return Err(RecomError::data(format!(
                "non-finite value {} for user {}, item {}",
                interaction.value, interaction.user_id, interaction.item_id
            )));
        }
        self.insert_unchecked(interaction);
        Ok(())
    }

    /// [`InteractionMatrix::insert`] for values already known to be finite.
    pub(crate) fn insert_unchecked(&mut self, interaction: Interaction) {
        let entry = Entry {
            value: interaction.value,
            timestamp: interaction.timestamp,
        };
        let previous = self
            .by_user
            .entry(interaction.user_id)
            .or_default()
            .insert(interaction.item_id, entry);
        self.by_item
            .entry(interaction.item_id)
            .or_default()
            .insert(interaction.user_id, interaction.value);
        if previous.is_none() {
            self.len += 1;
        }
    }

    /// Value for (user, item), or `None` when there is no interaction.
    ///
    /// A stored rating of `0.0` is returned as `Some(0.0)`.
    #[must_use]
    pub fn get(&self, user: UserId, item: ItemId) -> Option<f32> {
        self.by_user
            .get(&user)
            .and_then(|items| items.get(&item))
            .map(|entry| entry.value)
    }

    /// Timestamp for (user, item), if the interaction exists and has one.
    #[must_use]
    pub fn timestamp(&self, user: UserId, item: ItemId) -> Option<i64> {
        self.by_user
            .get(&user)
            .and_then(|items| items.get(&item))
            .and_then(|entry| entry.timestamp)
    }

    /// Distinct user ids, ascending.
    #[must_use]
    pub fn users(&self) -> Vec<UserId> {
        self.by_user.keys().copied().collect()
    }

    /// Distinct item ids, ascending.
    #[must_use]
    pub fn items(&self) -> Vec<ItemId> {
        self.by_item.keys().copied().collect()
    }

    /// Items a user interacted with, ascending by item id.
    #[must_use]
    pub fn user_items(&self, user: UserId) -> Option<&BTreeMap<ItemId, Entry>> {
        self.by_user.get(&user)
    }

    /// Users who interacted with an item, ascending by user id.
    #[must_use]
    pub fn item_users(&self, item: ItemId) -> Option<&BTreeMap<UserId, f32>> {
        self.by_item.get(&item)
    }

    /// True if the user has at least one interaction.
    #[must_use]
    pub fn contains_user(&self, user: UserId) -> bool {
        self.by_user.contains_key(&user)
    }

    /// True if the item has at least one interaction.
    #[must_use]
    pub fn contains_item(&self, item: ItemId) -> bool {
        self.by_item.contains_key(&item)
    }

    /// Number of stored (user, item) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct users.
    #[must_use]
    pub fn n_users(&self) -> usize {
        self.by_user.len()
    }

    /// Number of distinct items.
    #[must_use]
    pub fn n_items(&self) -> usize {
        self.by_item.len()
    }

    /// True if every stored interaction carries a timestamp.
    #[must_use]
    pub fn has_timestamps(&self) -> bool {
        self.by_user
            .values()
            .all(|items| items.values().all(|entry| entry.timestamp.is_some()))
    }

    /// All interactions in (user, item) order.
    pub fn iter(&self) -> impl Iterator<Item = Interaction> + '_ {
        self.by_user.iter().flat_map(|(&user_id, items)| {
            items.iter().map(move |(&item_id, entry)| Interaction {
                user_id,
                item_id,
                value: entry.value,
                timestamp: entry.timestamp,
            })
        })
    }

    /// One user's interactions in item order; empty for an unknown user.
    pub fn iter_user(&self, user: UserId) -> impl Iterator<Item = Interaction> + '_ {
        self.by_user
            .get(&user)
            .into_iter()
            .flat_map(move |items| {
                items.iter().map(move |(&item_id, entry)| Interaction {
                    user_id: user,
                    item_id,
                    value: entry.value,
                    timestamp: entry.timestamp,
                })
            })
    }

    /// Check that the forward and inverse indices mirror each other.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let forward = self.by_user.iter().all(|(user, items)| {
            items.iter().all(|(item, entry)| {
                self.by_item
                    .get(item)
                    .and_then(|users| users.get(user))
                    .is_some_and(|value| value.to_bits() == entry.value.to_bits())
            })
        });
        let inverse_len: usize = self.by_item.values().map(BTreeMap::len).sum();
        let forward_len: usize = self.by_user.values().map(BTreeMap::len).sum();
        forward && inverse_len == forward_len && forward_len == self.len
    }

    /// Indices mirror each other and every stored value is finite.
    ///
    /// Matrices built through the public constructors always satisfy this;
    /// decoded artifacts are checked with it.
    pub(crate) fn is_well_formed(&self) -> bool {
        self.is_consistent()
            && self
                .by_user
                .values()
                .all(|items| items.values().all(|entry| entry.value.is_finite()))
    }
}
