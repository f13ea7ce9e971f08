//! Recom: collaborative-filtering recommenders with reproducible evaluation.
//!
//! Recom loads user–item interactions into a sparse matrix, splits them per
//! user into train and test, fits one of several recommenders and scores
//! its top-k lists with standard ranking metrics. Every stage is
//! deterministic: seeded generators, ordered maps and a fixed tie-break.
//!
//! # Quick Start
//!
//! ```
//! use recom::prelude::*;
//!
//! // Three users rating four items
//! let records = vec![
//!     InteractionRecord::new(1, 1, 5.0),
//!     InteractionRecord::new(1, 2, 3.0),
//!     InteractionRecord::new(1, 3, 4.0),
//!     InteractionRecord::new(1, 4, 1.0),
//!     InteractionRecord::new(2, 1, 4.0),
//!     InteractionRecord::new(2, 2, 2.0),
//!     InteractionRecord::new(2, 3, 5.0),
//!     InteractionRecord::new(2, 4, 2.0),
//!     InteractionRecord::new(3, 1, 1.0),
//!     InteractionRecord::new(3, 2, 5.0),
//!     InteractionRecord::new(3, 3, 2.0),
//!     InteractionRecord::new(3, 4, 4.0),
//! ];
//! let data = InteractionMatrix::load(records).unwrap();
//!
//! // Hold out a quarter of each user's interactions
//! let split = RandomSplit::new(0.75, 42).split(&data).unwrap();
//!
//! let mut model = UserKnn::new(2);
//! model.fit(&split.train).unwrap();
//!
//! let report = Evaluator::new(2).evaluate(&model, &split.test).unwrap();
//! assert!(report.precision >= 0.0 && report.precision <= 1.0);
//! ```
//!
//! # Modules
//!
//! - [`interactions`]: Interaction records and the sparse matrix
//! - [`model_selection`]: Per-user random and temporal train/test splits
//! - [`recommend`]: User/item kNN, matrix factorization, popularity
//! - [`metrics`]: Ranking metrics and the evaluator
//! - [`serialization`]: Versioned model persistence
//! - [`config`]: TOML pipeline configuration
//! - [`pipeline`]: Split, fit and evaluate in one call

pub mod config;
pub mod error;
pub mod interactions;
pub mod metrics;
pub mod model_selection;
pub mod pipeline;
pub mod prelude;
pub mod recommend;
pub mod serialization;
pub mod traits;

pub use error::{RecomError, Result};
pub use interactions::{InteractionMatrix, ItemId, UserId};
pub use traits::Recommender;
