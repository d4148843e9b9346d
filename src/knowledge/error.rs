//! Orchestrator-level error taxonomy.

use thiserror::Error;

use super::index::IndexError;
use super::store::StoreError;
use crate::embedding::EmbeddingError;

/// Why a knowledge operation did not happen.
///
/// Every variant except [`KnowledgeError::IndexInconsistency`] leaves the
/// store, embedding table, and index exactly as they were.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Malformed topic or query input. Nothing was mutated.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("a topic named {0:?} already exists")]
    DuplicateName(String),

    #[error("topic not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[source] StoreError),

    #[error("encoding failed: {0}")]
    Encoding(#[from] EmbeddingError),

    /// A vector did not have the engine's fixed dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The record is durable but the index could not be brought in line with it.
    /// A full rebuild has already been attempted when this is returned.
    #[error("index inconsistency: {0}")]
    IndexInconsistency(String),
}

impl From<StoreError> for KnowledgeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateName(name) => Self::DuplicateName(name),
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}

impl From<IndexError> for KnowledgeError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            other => Self::IndexInconsistency(other.to_string()),
        }
    }
}
