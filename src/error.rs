//! Error types for the twingraph engine.
//!
//! All errors are strongly typed with thiserror, split by layer so callers
//! can pattern-match: validation, storage, query, guidance. A rejected write
//! carries the currently-open version so the caller can decide to retry,
//! backfill historically, or discard.
//!
//! Note what is *not* here: a fact that contradicts prior high-confidence
//! data stores successfully and surfaces a [`crate::ConflictFlag`]. The
//! confidence penalty on conflict is a scoring decision, not an error.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entity::EntityId;
use crate::fact::FactVersion;
use crate::triple::{TripleId, VersionId};

/// Validation errors raised before anything touches storage.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Confidence value {value} is out of range [0.0, 1.0]")]
    ConfidenceOutOfRange {
        value: f32,
    },

    #[error("Invalid interval: from ({from}) must precede until ({until})")]
    InvalidInterval {
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    #[error("Predicate cannot be empty")]
    EmptyPredicate,

    #[error("Entity name cannot be empty")]
    EmptyEntityName,

    #[error("Historical insert requires a closed interval")]
    OpenHistoricalInterval,

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },
}

/// Storage errors from the fact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write's `as_of` does not strictly exceed the open head's
    /// valid-from. The open version rides along so the caller can retry with
    /// a fresh read, backfill via historical insert, or discard.
    #[error("Out-of-order write on {triple}: as_of {attempted} does not follow the open version")]
    OutOfOrderWrite {
        triple: TripleId,
        attempted: DateTime<Utc>,
        open: Box<FactVersion>,
    },

    /// An optimistic write lost the race on the chain head.
    #[error("Concurrent modification on {triple}: expected head {expected:?}, found {actual:?}")]
    ConcurrentModification {
        triple: TripleId,
        expected: Option<VersionId>,
        actual: Option<VersionId>,
    },

    /// The query time predates every version of the identity, or the
    /// identity is unknown. Distinct from an expired fact, which returns its
    /// last version with valid-until populated.
    #[error("No version of {triple} exists at or before the queried time")]
    NotFound {
        triple: TripleId,
    },

    /// A historical insert would overlap an existing version.
    #[error("Historical insert on {triple} overlaps an existing version")]
    IntervalOverlap {
        triple: TripleId,
        neighbor: Box<FactVersion>,
    },

    /// No open version to expire.
    #[error("No open version of {triple} to expire")]
    NothingOpen {
        triple: TripleId,
    },

    #[error("Storage backend error: {message}")]
    Backend {
        message: String,
    },
}

/// Query-layer errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The caller cancelled between batches; no partial results.
    #[error("Query cancelled")]
    Cancelled,

    #[error("Trend requires numeric values; {triple} holds {type_name} at {at}")]
    NonNumericTrend {
        triple: TripleId,
        type_name: &'static str,
        at: DateTime<Utc>,
    },

    #[error("Trend range is empty or bucket size is non-positive")]
    EmptyTrendRange,
}

/// Guidance-engine errors.
#[derive(Debug, Error)]
pub enum GuidanceError {
    /// The decision context contains no fact bearing on the outcome.
    #[error("Insufficient context: no facts bear on outcome '{outcome}' for entity {entity}")]
    InsufficientContext {
        entity: EntityId,
        outcome: String,
    },
}

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum TwinError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Guidance error: {0}")]
    Guidance(#[from] GuidanceError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl TwinError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call can succeed.
    ///
    /// Only a lost write race qualifies: the caller re-reads the head and
    /// retries with a fresh `as_of`. Everything else is deterministic.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::ConcurrentModification { .. })
        )
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result alias for engine operations.
pub type TwinResult<T> = Result<T, TwinError>;
