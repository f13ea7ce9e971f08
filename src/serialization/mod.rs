//! Model persistence.
//!
//! A fitted [`RecommenderModel`] is stored as a small fixed header followed
//! by a bincode payload:
//!
//! ```text
//! [4-byte magic: "RCOM"]
//! [2-byte format version, little-endian]
//! [bincode-encoded RecommenderModel]
//! [4-byte CRC32 of everything above, little-endian]
//! ```
//!
//! Readers reject foreign magic, checksum mismatches and decoded models
//! whose parts disagree as [`RecomError::Serialization`], and newer versions
//! as [`RecomError::UnsupportedVersion`].
//!
//! ```rust
//! use recom::prelude::*;
//!
//! let train = InteractionMatrix::load(vec![
//!     InteractionRecord::new(1, 1, 5.0),
//!     InteractionRecord::new(2, 1, 4.0),
//!     InteractionRecord::new(2, 2, 3.0),
//! ]).unwrap();
//! let mut model = RecommenderModel::from(ItemKnn::new(5));
//! model.fit(&train).unwrap();
//!
//! let bytes = recom::serialization::to_bytes(&model).unwrap();
//! let restored = recom::serialization::from_bytes(&bytes).unwrap();
//! assert_eq!(model.recommend(1, 3).unwrap(), restored.recommend(1, 3).unwrap());
//! ```

use std::path::Path;

use crate::error::{RecomError, Result};
use crate::recommend::RecommenderModel;
use crate::traits::Recommender;

/// File magic.
pub const MAGIC: [u8; 4] = *b"RCOM";

/// Current envelope version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

const CHECKSUM_LEN: usize = 4;

/// Encodes `model` into the versioned envelope.
///
/// # Errors
///
/// Returns [`RecomError::Serialization`] if bincode encoding fails.
pub fn to_bytes(model: &RecommenderModel) -> Result<Vec<u8>> {
    let payload = bincode::serialize(model)
        .map_err(|e| RecomError::Serialization(format!("Failed to serialize model: {e}")))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    let checksum = crc32fast::hash(&bytes);
    bytes.extend_from_slice(&checksum.to_le_bytes());
    Ok(bytes)
}

/// Decodes an envelope written by [`to_bytes`].
///
/// # Errors
///
/// Returns [`RecomError::Serialization`] for truncated, foreign or corrupt
/// input and [`RecomError::UnsupportedVersion`] for an unknown version.
pub fn from_bytes(bytes: &[u8]) -> Result<RecommenderModel> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(RecomError::Serialization(format!(
            "model blob too short: {} bytes, envelope needs {}",
            bytes.len(),
            HEADER_LEN + CHECKSUM_LEN
        )));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let (header, payload) = body.split_at(HEADER_LEN);
    if header[..MAGIC.len()] != MAGIC {
        return Err(RecomError::Serialization(
            "invalid magic: not a recom model".to_string(),
        ));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(RecomError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = crc32fast::hash(body);
    if stored != computed {
        return Err(RecomError::Serialization(format!(
            "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }
    let model: RecommenderModel = bincode::deserialize(payload)
        .map_err(|e| RecomError::Serialization(format!("Failed to deserialize model: {e}")))?;
    model.check_integrity()?;
    Ok(model)
}

/// Writes `model` to `path`.
///
/// # Errors
///
/// Returns [`RecomError::Io`] on write failure or the [`to_bytes`] errors.
pub fn save(model: &RecommenderModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_bytes(model)?;
    std::fs::write(path, &bytes)?;
    tracing::info!(
        path = %path.display(),
        model = model.name(),
        bytes = bytes.len(),
        "model saved"
    );
    Ok(())
}

/// Reads a model written by [`save`].
///
/// # Errors
///
/// Returns [`RecomError::Io`] on read failure or the [`from_bytes`] errors.
pub fn load(path: impl AsRef<Path>) -> Result<RecommenderModel> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let model = from_bytes(&bytes)?;
    tracing::info!(path = %path.display(), model = model.name(), "model loaded");
    Ok(model)
}
