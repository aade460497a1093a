//! The engine facade — the only write path into the graph.
//!
//! Upstream extraction pipelines submit candidate facts; the engine is the
//! sole authority on acceptance and versioning. Ingestion derives the
//! confidence components (reliability lookup, corroboration count,
//! contradiction check), scores the candidate, versions it, and surfaces a
//! conflict flag when the accepted fact contradicts a high-confidence
//! incumbent. Downstream consumers get the query surface and guidance
//! ranking; nobody writes into a version chain directly.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::confidence::{ConfidenceComponents, ConfidenceModel};
use crate::conflict::{ConflictFlag, ConflictId, ConflictLedger, FlagStatus};
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{TwinResult, ValidationError};
use crate::fact::{FactDraft, FactVersion};
use crate::guidance::{DecisionContext, GuidanceConfig, GuidanceEngine, Recommendation};
use crate::interval::Interval;
use crate::provenance::{Provenance, SourceId, SourceRegistry};
use crate::query::{CancelToken, ChangeEvent, QueryLayer, Snapshot, TrendPoint};
use crate::store::FactStore;
use crate::triple::{TripleId, TripleKey, VersionId};
use crate::value::Value;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Confidence weights, decay calibration, and conflict policy.
    pub confidence: ConfidenceModel,

    /// Guidance catalog and influence models.
    pub guidance: GuidanceConfig,

    /// Reliability assumed for sources nobody has rated yet.
    pub default_source_reliability: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence: ConfidenceModel::default(),
            guidance: GuidanceConfig::default(),
            default_source_reliability: 0.5,
        }
    }
}

/// A candidate fact submitted by the extraction pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFact {
    /// Triple identity being asserted.
    pub key: TripleKey,

    /// Value payload.
    pub value: Value,

    /// Where the assertion came from.
    pub provenance: Provenance,

    /// When the fact became true in the world.
    pub as_of: DateTime<Utc>,
}

impl CandidateFact {
    /// Creates a candidate fact.
    #[must_use]
    pub fn new(
        key: TripleKey,
        value: impl Into<Value>,
        provenance: Provenance,
        as_of: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            value: value.into(),
            provenance,
            as_of,
        }
    }
}

/// What ingestion produced: the stored version and, when the fact
/// contradicted a high-confidence incumbent, the surfaced flag.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    /// The stored, scored version.
    pub version: FactVersion,

    /// Present when the fact contradicted prior high-confidence data. Not
    /// an error — the fact is stored with a scoring discount and the
    /// contradiction awaits review.
    pub conflict: Option<ConflictFlag>,
}

/// The temporal knowledge graph engine.
///
/// # Examples
///
/// ```
/// use twingraph::{
///     CandidateFact, EngineConfig, EntityKind, Provenance, TripleKey, TwinEngine,
/// };
/// use chrono::Utc;
///
/// let engine = TwinEngine::new(EngineConfig::default());
/// let loan = engine.register_entity("loanA", EntityKind::Asset).id;
///
/// let receipt = engine
///     .ingest(CandidateFact::new(
///         TripleKey::literal(loan, "creditScore"),
///         680,
///         Provenance::structured("bureau", 0.95).unwrap(),
///         Utc::now(),
///     ))
///     .unwrap();
/// assert!(receipt.conflict.is_none());
/// ```
pub struct TwinEngine {
    store: Arc<FactStore>,
    sources: Arc<SourceRegistry>,
    confidence: ConfidenceModel,
    conflicts: Arc<ConflictLedger>,
    query: QueryLayer,
    guidance: GuidanceEngine,
    #[cfg(feature = "persistent")]
    journal: Option<crate::journal::Journal>,
}

impl TwinEngine {
    /// Creates an in-memory engine.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(FactStore::new());
        let sources = Arc::new(SourceRegistry::new(config.default_source_reliability.max(0.0)));
        let query = QueryLayer::new(Arc::clone(&store));
        let guidance = GuidanceEngine::new(Arc::clone(&store), config.guidance);
        Self {
            store,
            sources,
            confidence: config.confidence,
            conflicts: Arc::new(ConflictLedger::new()),
            query,
            guidance,
            #[cfg(feature = "persistent")]
            journal: None,
        }
    }

    /// The underlying store (read surface).
    #[must_use]
    pub fn store(&self) -> &Arc<FactStore> {
        &self.store
    }

    /// The source reliability registry.
    #[must_use]
    pub fn sources(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    // -- entities -----------------------------------------------------------

    /// Registers (or looks up) a named entity. Registration is idempotent;
    /// the first kind wins.
    pub fn register_entity(&self, name: &str, kind: EntityKind) -> Entity {
        let entity = Entity::named(name, kind, Utc::now());
        let stored = self.store.register_entity(entity.clone());
        #[cfg(feature = "persistent")]
        if stored == entity {
            self.append_journal(crate::journal::JournalOp::Entity {
                entity: stored.clone(),
            });
        }
        stored
    }

    /// Looks up a registered entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.store.entity(id)
    }

    /// Re-rates a source. Stored facts are untouched; recomputed scores pick
    /// the new rating up through [`Self::current_confidence`].
    pub fn rate_source(&self, source: SourceId, reliability: f32) {
        self.sources.rate(source, reliability);
    }

    // -- ingestion ----------------------------------------------------------

    /// Scores and versions a candidate fact.
    ///
    /// Closes any open version of the identity at `as_of` and opens the new
    /// one. A fact contradicting a high-confidence incumbent still stores —
    /// discounted and flagged, never silently resolved.
    ///
    /// # Errors
    ///
    /// Validation errors for malformed candidates; `OutOfOrderWrite`
    /// (carrying the open version) when `as_of` violates chain ordering.
    pub fn ingest(&self, candidate: CandidateFact) -> TwinResult<IngestReceipt> {
        self.ingest_inner(candidate, None)
    }

    /// Optimistic ingest: fails with `ConcurrentModification` when the chain
    /// head is no longer `expected_head`, instead of queueing behind other
    /// writers. The caller re-reads and retries with a fresh `as_of`, or
    /// gives up.
    pub fn ingest_guarded(
        &self,
        candidate: CandidateFact,
        expected_head: Option<VersionId>,
    ) -> TwinResult<IngestReceipt> {
        self.ingest_inner(candidate, Some(expected_head))
    }

    fn ingest_inner(
        &self,
        candidate: CandidateFact,
        expected_head: Option<Option<VersionId>>,
    ) -> TwinResult<IngestReceipt> {
        let CandidateFact {
            key,
            value,
            provenance,
            as_of,
        } = candidate;

        if key.predicate.trim().is_empty() {
            return Err(ValidationError::EmptyPredicate.into());
        }

        self.ensure_entities(&key, &value);

        let incumbent = self.store.open_head(key.identity());
        let components = self.derive_components(&key, &value, &provenance, as_of, incumbent.as_ref());
        let score = self
            .confidence
            .score(&key.predicate, &components, as_of, as_of);
        let contradicts = components.contradicts_incumbent;

        let draft = FactDraft::new(value, provenance, components, score);
        let version = match expected_head {
            None => self.store.upsert(&key, draft, as_of)?,
            Some(expected) => self.store.upsert_if_head(&key, draft, as_of, expected)?,
        };

        #[cfg(feature = "persistent")]
        self.append_journal(crate::journal::JournalOp::Upsert {
            key: key.clone(),
            draft: FactDraft::new(
                version.value.clone(),
                version.provenance.clone(),
                version.components.clone(),
                version.confidence,
            ),
            as_of,
            id: version.id,
            recorded_at: version.recorded_at,
        });

        let conflict = if contradicts {
            // `contradicts` implies an open incumbent existed.
            let incumbent = incumbent.expect("contradiction implies incumbent");
            let flag = ConflictFlag {
                id: ConflictId::new(),
                triple: version.triple,
                incumbent: incumbent.id,
                incumbent_value: incumbent.value.clone(),
                incumbent_confidence: self.current_confidence(&incumbent, as_of),
                challenger: version.id,
                challenger_value: version.value.clone(),
                incumbent_reliability: self.sources.reliability(incumbent.provenance.source),
                challenger_reliability: self.sources.reliability(version.provenance.source),
                detected_at: as_of,
                status: FlagStatus::Open,
            };
            tracing::warn!(
                triple = %version.triple,
                predicate = %version.key.predicate,
                "stored fact contradicts high-confidence incumbent"
            );
            self.conflicts.record(flag.clone());
            Some(flag)
        } else {
            None
        };

        Ok(IngestReceipt { version, conflict })
    }

    /// Backfills a sealed version into an identity's past.
    ///
    /// The explicit path for callers whose `upsert` was rejected as
    /// out-of-order: the interval must be closed and ordering against both
    /// neighbors is re-validated.
    pub fn backfill(
        &self,
        candidate: CandidateFact,
        until: DateTime<Utc>,
    ) -> TwinResult<FactVersion> {
        let CandidateFact {
            key,
            value,
            provenance,
            as_of,
        } = candidate;

        if key.predicate.trim().is_empty() {
            return Err(ValidationError::EmptyPredicate.into());
        }
        let validity = Interval::new(as_of, until)?;

        self.ensure_entities(&key, &value);

        // Historical inserts corroborate nothing and contradict nothing:
        // they fill gaps behind the head.
        let components = ConfidenceComponents::solo(
            self.sources.reliability(provenance.source),
            provenance.extraction_confidence,
        );
        let score = self
            .confidence
            .score(&key.predicate, &components, as_of, as_of);

        let draft = FactDraft::new(value, provenance, components, score);
        let version = self.store.insert_historical(&key, draft, validity)?;

        #[cfg(feature = "persistent")]
        self.append_journal(crate::journal::JournalOp::Historical {
            key,
            draft: FactDraft::new(
                version.value.clone(),
                version.provenance.clone(),
                version.components.clone(),
                version.confidence,
            ),
            validity: version.validity.clone(),
            id: version.id,
            recorded_at: version.recorded_at,
        });

        Ok(version)
    }

    /// Explicitly retracts the open version of an identity at `at`.
    pub fn expire(&self, triple: TripleId, at: DateTime<Utc>) -> TwinResult<FactVersion> {
        let version = self.store.expire(triple, at)?;
        #[cfg(feature = "persistent")]
        self.append_journal(crate::journal::JournalOp::Expire { triple, at });
        Ok(version)
    }

    fn ensure_entities(&self, key: &TripleKey, value: &Value) {
        let mut referenced: BTreeSet<EntityId> = BTreeSet::from([key.subject]);
        if let Some(target) = key.object_entity() {
            referenced.insert(target);
        }
        if let Some(target) = value.as_entity() {
            referenced.insert(target);
        }
        for id in referenced {
            if !self.store.knows_entity(id) {
                // Created on first fact; callers wanting names and kinds
                // register up front.
                let entity = Entity {
                    id,
                    name: id.to_string(),
                    kind: EntityKind::Custom("untyped".to_string()),
                    first_seen: Utc::now(),
                };
                let stored = self.store.register_entity(entity);
                #[cfg(feature = "persistent")]
                self.append_journal(crate::journal::JournalOp::Entity { entity: stored });
                #[cfg(not(feature = "persistent"))]
                let _ = stored;
            }
        }
    }

    fn derive_components(
        &self,
        key: &TripleKey,
        value: &Value,
        provenance: &Provenance,
        as_of: DateTime<Utc>,
        incumbent: Option<&FactVersion>,
    ) -> ConfidenceComponents {
        let source_reliability = self.sources.reliability(provenance.source);
        let mut components =
            ConfidenceComponents::solo(source_reliability, provenance.extraction_confidence);

        let Some(incumbent) = incumbent else {
            return components;
        };

        if incumbent.value.semantically_eq(value) {
            // Same value from another source: corroboration, counted over
            // the distinct sources in the chain's maximal same-value suffix.
            components.corroborating_sources = self.corroborating_sources(key, value, provenance);
        } else if incumbent.is_live_at(as_of) {
            // Contradiction: penalize unless the challenger's provenance is
            // comparable or better.
            let incumbent_confidence = self.current_confidence(incumbent, as_of);
            let incumbent_reliability = self.sources.reliability(incumbent.provenance.source);
            let policy = &self.confidence.conflict;
            if incumbent_confidence > policy.high_confidence_threshold
                && source_reliability < incumbent_reliability - policy.reliability_margin
            {
                components.contradicts_incumbent = true;
            }
        }
        components
    }

    /// Distinct sources asserting `value` in the chain's maximal same-value
    /// suffix, plus the incoming source.
    fn corroborating_sources(
        &self,
        key: &TripleKey,
        value: &Value,
        provenance: &Provenance,
    ) -> u32 {
        let mut sources: BTreeSet<SourceId> = BTreeSet::from([provenance.source]);
        if let Ok(history) = self.store.history(key.identity()) {
            for version in history.iter().rev() {
                if !version.value.semantically_eq(value) {
                    break;
                }
                sources.insert(version.provenance.source);
            }
        }
        sources.len() as u32
    }

    // -- confidence ---------------------------------------------------------

    /// Recomputes a version's confidence at `now` with the current source
    /// rating. Pure: mutates nothing, cheap enough to call per read.
    #[must_use]
    pub fn current_confidence(&self, version: &FactVersion, now: DateTime<Utc>) -> f32 {
        let mut components = version.components.clone();
        components.source_reliability = self.sources.reliability(version.provenance.source);
        self.confidence
            .score(&version.key.predicate, &components, version.validity.from, now)
    }

    // -- queries ------------------------------------------------------------

    /// The version of an identity valid at `at`.
    pub fn get_at(&self, triple: TripleId, at: DateTime<Utc>) -> TwinResult<FactVersion> {
        Ok(self.store.get_at(triple, at)?)
    }

    /// Full version history of an identity, oldest first.
    pub fn history(&self, triple: TripleId) -> TwinResult<Vec<FactVersion>> {
        Ok(self.store.history(triple)?)
    }

    /// Point-in-time subgraph of an entity.
    #[must_use]
    pub fn snapshot(&self, entity: EntityId, at: DateTime<Utc>) -> Snapshot {
        self.query.snapshot(entity, at)
    }

    /// Subgraph expanded across edges up to `hops` hops.
    #[must_use]
    pub fn neighborhood(&self, entity: EntityId, at: DateTime<Utc>, hops: usize) -> Snapshot {
        self.query.neighborhood(entity, at, hops)
    }

    /// Changes on an entity's subgraph between two instants.
    pub fn diff(
        &self,
        entity: EntityId,
        a: DateTime<Utc>,
        b: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> TwinResult<Vec<ChangeEvent>> {
        Ok(self.query.diff(entity, a, b, cancel)?)
    }

    /// Bucketed numeric trend of an identity.
    pub fn trend(
        &self,
        triple: TripleId,
        range: &Interval,
        bucket: chrono::Duration,
        cancel: &CancelToken,
    ) -> TwinResult<Vec<TrendPoint>> {
        Ok(self.query.trend(triple, range, bucket, cancel)?)
    }

    /// Ranks candidate information-gathering actions for a decision context.
    pub fn recommend(&self, ctx: &DecisionContext) -> TwinResult<Recommendation> {
        Ok(self.guidance.recommend(ctx)?)
    }

    // -- conflicts ----------------------------------------------------------

    /// Flags awaiting review.
    #[must_use]
    pub fn open_conflicts(&self) -> Vec<ConflictFlag> {
        self.conflicts.open_flags()
    }

    /// All flags on an identity.
    #[must_use]
    pub fn conflicts_for(&self, triple: TripleId) -> Vec<ConflictFlag> {
        self.conflicts.for_triple(triple)
    }

    /// Updates a flag's review status. Returns false for an unknown id.
    pub fn review_conflict(&self, id: ConflictId, status: FlagStatus) -> bool {
        self.conflicts.set_status(id, status)
    }

    // -- durability ---------------------------------------------------------

    /// Opens an engine backed by an append-only journal, replaying any
    /// existing records into memory first.
    #[cfg(feature = "persistent")]
    pub fn open_durable(
        path: &std::path::Path,
        config: EngineConfig,
    ) -> TwinResult<Self> {
        let mut engine = Self::new(config);
        let (journal, records) = crate::journal::Journal::open(path)
            .map_err(|e| crate::error::TwinError::internal(format!("journal open failed: {e}")))?;
        for record in records {
            engine.replay(record.op)?;
        }
        engine.journal = Some(journal);
        Ok(engine)
    }

    #[cfg(feature = "persistent")]
    fn replay(&self, op: crate::journal::JournalOp) -> TwinResult<()> {
        use crate::journal::JournalOp;
        match op {
            JournalOp::Entity { entity } => {
                self.store.register_entity(entity);
            }
            JournalOp::Upsert {
                key,
                draft,
                as_of,
                id,
                recorded_at,
            } => {
                self.store.upsert_with_id(&key, draft, as_of, id, recorded_at)?;
            }
            JournalOp::Historical {
                key,
                draft,
                validity,
                id,
                recorded_at,
            } => {
                self.store
                    .insert_historical_with_id(&key, draft, validity, id, recorded_at)?;
            }
            JournalOp::Expire { triple, at } => {
                self.store.expire(triple, at)?;
            }
        }
        Ok(())
    }

    #[cfg(feature = "persistent")]
    fn append_journal(&self, op: crate::journal::JournalOp) {
        if let Some(journal) = &self.journal {
            if let Err(error) = journal.append(&op) {
                tracing::error!(%error, "journal append failed");
            }
        }
    }
}
