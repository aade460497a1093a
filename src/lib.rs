//! # twingraph — temporal knowledge graphs for digital twins
//!
//! twingraph versions graph facts over time, attaches provenance-weighted
//! confidence to every fact, and estimates which additional fact would most
//! reduce decision uncertainty. It is the storage and query core of a
//! digital-twin system: extraction pipelines feed it candidate facts, and
//! decision layers read snapshots, diffs, trends, and ranked
//! information-gathering recommendations back out.
//!
//! ## Core concepts
//!
//! - **Entity**: a stable twin subject, created on first fact
//! - **Triple identity**: (subject, predicate, object shape), time-independent
//! - **FactVersion**: one temporally-bounded value of a triple, with
//!   provenance, confidence components, and supersession back-references
//! - **ConflictFlag**: a stored contradiction surfaced for review, never
//!   silently resolved
//! - **Recommendation**: information-value-ranked candidate actions with a
//!   reasoning path
//!
//! ## Usage
//!
//! ```
//! use twingraph::{
//!     CandidateFact, EngineConfig, EntityKind, Provenance, TripleKey, TwinEngine,
//! };
//! use chrono::Utc;
//!
//! let engine = TwinEngine::new(EngineConfig::default());
//! let loan = engine.register_entity("loanA", EntityKind::Asset).id;
//!
//! // A candidate fact from the extraction pipeline.
//! let receipt = engine
//!     .ingest(CandidateFact::new(
//!         TripleKey::literal(loan, "creditScore"),
//!         680,
//!         Provenance::structured("bureau", 0.95).unwrap(),
//!         Utc::now(),
//!     ))
//!     .unwrap();
//!
//! // Point-in-time view.
//! let snapshot = engine.snapshot(loan, Utc::now());
//! assert_eq!(snapshot.len(), 1);
//! # let _ = receipt;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Core types
pub mod confidence;
pub mod conflict;
pub mod entity;
pub mod error;
pub mod fact;
pub mod interval;
pub mod provenance;
pub mod triple;
pub mod value;

// Storage, queries, guidance, and the facade
pub mod engine;
pub mod guidance;
pub mod query;
pub mod store;

#[cfg(feature = "persistent")]
pub mod journal;

// Re-export primary types at crate root for convenience
pub use confidence::{
    ConfidenceComponents, ConfidenceModel, ConfidenceWeights, ConflictPolicy, DecayClass,
    DecayPolicy,
};
pub use conflict::{ConflictFlag, ConflictId, ConflictLedger, FlagStatus};
pub use engine::{CandidateFact, EngineConfig, IngestReceipt, TwinEngine};
pub use entity::{Entity, EntityId, EntityKind};
pub use error::{GuidanceError, QueryError, StoreError, TwinError, TwinResult, ValidationError};
pub use fact::{FactDraft, FactVersion};
pub use guidance::{
    CandidateAction, CandidateSpec, DecisionContext, GuidanceConfig, GuidanceEngine, Influence,
    OutcomeVariable, ReasoningPath, ReasoningStep, Recommendation, SkipReason, SkippedCandidate,
};
pub use interval::Interval;
pub use provenance::{ExtractionMethod, Provenance, SourceId, SourceRegistry};
pub use query::{CancelToken, ChangeEvent, ChangeKind, QueryLayer, Snapshot, TrendPoint};
pub use store::FactStore;
pub use triple::{ObjectShape, TripleId, TripleKey, VersionId};
pub use value::{Value, ValueKey};
