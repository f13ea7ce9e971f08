//! Error types for recom operations.
//!
//! Every error names the offending id and the operation that raised it so
//! the caller can decide on a fallback.

use std::fmt;

use crate::interactions::{ItemId, UserId};

/// Which side of the interaction matrix a cold-start error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// A user id
    User,
    /// An item id
    Item,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::User => write!(f, "user"),
            Entity::Item => write!(f, "item"),
        }
    }
}

/// Main error type for recom operations.
///
/// # Examples
///
/// ```
/// use recom::error::RecomError;
///
/// let err = RecomError::cold_start_user(7, "recommend");
/// assert!(err.to_string().contains("user 7"));
/// assert!(err.is_cold_start());
/// ```
#[derive(Debug)]
pub enum RecomError {
    /// Malformed or missing input fields.
    Data {
        /// What was wrong and where
        message: String,
    },

    /// A user does not have enough interactions for the operation.
    InsufficientData {
        /// Affected user
        user: UserId,
        /// Interactions the user has
        interactions: usize,
        /// Interactions the operation needs
        required: usize,
        /// Operation that was attempted
        operation: String,
    },

    /// Unknown user or item at recommend/predict time.
    ColdStart {
        /// User or item
        entity: Entity,
        /// The unknown id
        id: u64,
        /// Operation that was attempted
        operation: String,
    },

    /// `recommend` or `predict` called before `fit`.
    NotFitted {
        /// Model name
        model: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Configuration could not be parsed.
    Config(String),

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Unsupported artifact format version.
    UnsupportedVersion {
        /// Version found
        found: u16,
        /// Version this build reads
        supported: u16,
    },
}

impl fmt::Display for RecomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecomError::Data { message } => write!(f, "Data error: {message}"),
            RecomError::InsufficientData {
                user,
                interactions,
                required,
                operation,
            } => {
                write!(
                    f,
                    "Insufficient data for user {user} in {operation}: \
                     {interactions} interaction(s), need at least {required}"
                )
            }
            RecomError::ColdStart {
                entity,
                id,
                operation,
            } => {
                write!(f, "Cold start in {operation}: {entity} {id} not seen during fit")
            }
            RecomError::NotFitted { model } => {
                write!(f, "Model not fitted: call fit() on {model} first")
            }
            RecomError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            RecomError::Config(msg) => write!(f, "Configuration error: {msg}"),
            RecomError::Io(e) => write!(f, "I/O error: {e}"),
            RecomError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            RecomError::UnsupportedVersion { found, supported } => {
                write!(
                    f,
                    "Unsupported artifact version: found {found}, supported {supported}"
                )
            }
        }
    }
}

impl std::error::Error for RecomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecomError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RecomError {
    fn from(err: std::io::Error) -> Self {
        RecomError::Io(err)
    }
}

impl From<bincode::Error> for RecomError {
    fn from(err: bincode::Error) -> Self {
        RecomError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RecomError {
    fn from(err: toml::de::Error) -> Self {
        RecomError::Config(err.to_string())
    }
}

impl RecomError {
    /// Create a data error.
    #[must_use]
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Create a cold-start error for an unknown user.
    #[must_use]
    pub fn cold_start_user(user: UserId, operation: &str) -> Self {
        Self::ColdStart {
            entity: Entity::User,
            id: user,
            operation: operation.to_string(),
        }
    }

    /// Create a cold-start error for an unknown item.
    #[must_use]
    pub fn cold_start_item(item: ItemId, operation: &str) -> Self {
        Self::ColdStart {
            entity: Entity::Item,
            id: item,
            operation: operation.to_string(),
        }
    }

    /// Create a not-fitted error.
    #[must_use]
    pub fn not_fitted(model: &str) -> Self {
        Self::NotFitted {
            model: model.to_string(),
        }
    }

    /// Create an invalid hyperparameter error.
    #[must_use]
    pub fn invalid_hyperparameter(
        param: &str,
        value: impl fmt::Display,
        constraint: &str,
    ) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a serialization error for a decoded model whose parts disagree.
    #[must_use]
    pub fn corrupt_artifact(model: &str, detail: impl fmt::Display) -> Self {
        Self::Serialization(format!("corrupt {model} artifact: {detail}"))
    }

    /// True for [`RecomError::ColdStart`].
    #[must_use]
    pub fn is_cold_start(&self) -> bool {
        matches!(self, RecomError::ColdStart { .. })
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, RecomError>;

/// Factorization stopped at `max_epochs` before reaching its tolerance.
///
/// Not an error: the partially converged model is still usable. It is
/// logged at `warn` level and kept on the model for inspection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConvergenceWarning {
    /// Epochs run
    pub epochs: usize,
    /// Loss after the last epoch
    pub final_loss: f32,
    /// Configured relative tolerance
    pub tolerance: f32,
    /// Relative loss change over the last epoch
    pub last_delta: f32,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did not converge after {} epochs: loss = {}, relative change {} > tolerance {}",
            self.epochs, self.final_loss, self.last_delta, self.tolerance
        )
    }
}
