use thiserror::Error;

use crate::types::SourceId;

/// Error type for catalog loading, rotation coordination, and persistence failures.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The catalog source could not be reached or returned no items.
    /// Transient; callers may retry.
    #[error("catalog source '{source_id}' is unavailable: {reason}")]
    CatalogUnavailable {
        /// Source that failed.
        source_id: SourceId,
        /// Backend-reported failure reason.
        reason: String,
    },
    /// The catalog holds zero items; not retryable until it is populated.
    #[error("catalog is empty; rotation requires at least one item")]
    EmptyCatalog,
    /// The state transaction kept losing the commit race and gave up.
    /// Transient; callers may re-invoke.
    #[error("state transaction aborted after {attempts} conflicting attempts")]
    TransactionAborted {
        /// Number of body executions before giving up.
        attempts: usize,
    },
    /// The persisted rotation record violates its range invariants.
    /// Not retryable without correcting the record.
    #[error(
        "rotation record out of range (start_index={start_index}, batch_size={batch_size}, total={total})"
    )]
    InvalidRange {
        /// Offending start index.
        start_index: u64,
        /// Offending batch size.
        batch_size: u64,
        /// Catalog size the record was checked against.
        total: u64,
    },
    /// State store backend failure (I/O, serialization, poisoned lock).
    #[error("state store failure: {0}")]
    Store(String),
    /// Invalid rotation configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
