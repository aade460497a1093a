//! The Fact Store — append-only versioned storage of triples.
//!
//! Chains are sharded under per-identity locks: readers and writers on
//! disjoint triple identities never contend, writers on the same identity
//! serialize on the chain lock, and optimistic writers can use
//! [`FactStore::upsert_if_head`] to fail fast with `ConcurrentModification`
//! instead of queueing.
//!
//! Secondary indexes — by subject, by object entity, by predicate — exist
//! for subgraph assembly and corpus base rates. They are updated when a
//! chain is created, which is the only time a triple's membership changes.

mod chain;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::entity::{Entity, EntityId};
use crate::error::StoreError;
use crate::fact::{FactDraft, FactVersion};
use crate::interval::Interval;
use crate::triple::{TripleId, TripleKey, VersionId};

use chain::Chain;

type ChainHandle = Arc<RwLock<Chain>>;

/// Append-only versioned storage of triples with temporal validity.
///
/// # Examples
///
/// ```
/// use twingraph::{ConfidenceComponents, EntityId, FactDraft, FactStore, Provenance, TripleKey};
/// use chrono::Utc;
///
/// let store = FactStore::new();
/// let key = TripleKey::literal(EntityId::from_name("loanA"), "creditScore");
/// let draft = FactDraft::new(
///     680.into(),
///     Provenance::structured("bureau", 0.95).unwrap(),
///     ConfidenceComponents::solo(0.9, 0.95),
///     0.8,
/// );
/// let version = store.upsert(&key, draft, Utc::now()).unwrap();
/// assert!(version.is_open());
/// ```
#[derive(Debug, Default)]
pub struct FactStore {
    chains: RwLock<HashMap<TripleId, ChainHandle>>,
    by_subject: RwLock<HashMap<EntityId, BTreeSet<TripleId>>>,
    by_object: RwLock<HashMap<EntityId, BTreeSet<TripleId>>>,
    by_predicate: RwLock<HashMap<String, BTreeSet<TripleId>>>,
    entities: RwLock<HashMap<EntityId, Entity>>,
}

impl FactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- entities -----------------------------------------------------------

    /// Registers an entity. First registration wins; re-registering an id
    /// returns the stored record unchanged (entities are never deleted).
    pub fn register_entity(&self, entity: Entity) -> Entity {
        let mut guard = self.entities.write().expect("entity registry lock poisoned");
        guard.entry(entity.id).or_insert(entity).clone()
    }

    /// Looks up a registered entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        let guard = self.entities.read().expect("entity registry lock poisoned");
        guard.get(&id).cloned()
    }

    /// Returns true if the entity has been registered.
    #[must_use]
    pub fn knows_entity(&self, id: EntityId) -> bool {
        let guard = self.entities.read().expect("entity registry lock poisoned");
        guard.contains_key(&id)
    }

    // -- chain plumbing -----------------------------------------------------

    fn chain_handle(&self, triple: TripleId) -> Option<ChainHandle> {
        let guard = self.chains.read().expect("chain map lock poisoned");
        guard.get(&triple).cloned()
    }

    fn chain_or_create(&self, key: &TripleKey) -> ChainHandle {
        let triple = key.identity();
        if let Some(handle) = self.chain_handle(triple) {
            return handle;
        }

        let mut guard = self.chains.write().expect("chain map lock poisoned");
        if let Some(handle) = guard.get(&triple) {
            return handle.clone();
        }

        let handle = Arc::new(RwLock::new(Chain::new(key.clone())));
        guard.insert(triple, handle.clone());
        drop(guard);

        self.by_subject
            .write()
            .expect("subject index lock poisoned")
            .entry(key.subject)
            .or_default()
            .insert(triple);
        if let Some(target) = key.object_entity() {
            self.by_object
                .write()
                .expect("object index lock poisoned")
                .entry(target)
                .or_default()
                .insert(triple);
        }
        self.by_predicate
            .write()
            .expect("predicate index lock poisoned")
            .entry(key.predicate.clone())
            .or_default()
            .insert(triple);

        handle
    }

    // -- writes -------------------------------------------------------------

    /// Closes any open version of the identity at `as_of` and opens a new
    /// one with valid-from = `as_of`.
    ///
    /// # Errors
    ///
    /// `OutOfOrderWrite` (carrying the currently-open version) when `as_of`
    /// does not strictly exceed the open version's valid-from;
    /// `IntervalOverlap` when the chain is fully sealed and `as_of` falls
    /// inside its past.
    pub fn upsert(
        &self,
        key: &TripleKey,
        draft: FactDraft,
        as_of: DateTime<Utc>,
    ) -> Result<FactVersion, StoreError> {
        self.upsert_with_id(key, draft, as_of, VersionId::new(), Utc::now())
    }

    pub(crate) fn upsert_with_id(
        &self,
        key: &TripleKey,
        draft: FactDraft,
        as_of: DateTime<Utc>,
        id: VersionId,
        recorded_at: DateTime<Utc>,
    ) -> Result<FactVersion, StoreError> {
        let handle = self.chain_or_create(key);
        let mut chain = handle.write().expect("chain lock poisoned");
        let result = chain.upsert(draft, as_of, id, recorded_at);
        if let Err(StoreError::OutOfOrderWrite { triple, attempted, .. }) = &result {
            tracing::debug!(%triple, %attempted, "rejected out-of-order write");
        }
        result
    }

    /// Compare-and-swap upsert for optimistic writers with retries disabled.
    ///
    /// `expected_head` is the open version id the caller last read (`None`
    /// for "no open version"). If the chain head has moved, fails with
    /// `ConcurrentModification` and the caller decides whether to re-read
    /// and retry with a fresh `as_of`.
    pub fn upsert_if_head(
        &self,
        key: &TripleKey,
        draft: FactDraft,
        as_of: DateTime<Utc>,
        expected_head: Option<VersionId>,
    ) -> Result<FactVersion, StoreError> {
        let triple = key.identity();
        let handle = match self.chain_handle(triple) {
            Some(handle) => handle,
            None if expected_head.is_none() => self.chain_or_create(key),
            None => {
                return Err(StoreError::ConcurrentModification {
                    triple,
                    expected: expected_head,
                    actual: None,
                });
            }
        };

        let mut chain = handle.write().expect("chain lock poisoned");
        let actual = chain.open_head().map(|v| v.id);
        if actual != expected_head {
            tracing::debug!(%triple, "optimistic write lost the head race");
            return Err(StoreError::ConcurrentModification {
                triple,
                expected: expected_head,
                actual,
            });
        }
        chain.upsert(draft, as_of, VersionId::new(), Utc::now())
    }

    /// Closes the open version without replacement (explicit retraction).
    pub fn expire(&self, triple: TripleId, at: DateTime<Utc>) -> Result<FactVersion, StoreError> {
        let handle = self
            .chain_handle(triple)
            .ok_or(StoreError::NothingOpen { triple })?;
        let mut chain = handle.write().expect("chain lock poisoned");
        chain.expire(at)
    }

    /// Backfills a sealed version into the identity's past.
    ///
    /// The interval must be closed; ordering against both neighbors and the
    /// open head is re-validated.
    pub fn insert_historical(
        &self,
        key: &TripleKey,
        draft: FactDraft,
        validity: Interval,
    ) -> Result<FactVersion, StoreError> {
        self.insert_historical_with_id(key, draft, validity, VersionId::new(), Utc::now())
    }

    pub(crate) fn insert_historical_with_id(
        &self,
        key: &TripleKey,
        draft: FactDraft,
        validity: Interval,
        id: VersionId,
        recorded_at: DateTime<Utc>,
    ) -> Result<FactVersion, StoreError> {
        if validity.until.is_none() {
            return Err(StoreError::Backend {
                message: "historical insert requires a closed interval".to_string(),
            });
        }
        let handle = self.chain_or_create(key);
        let mut chain = handle.write().expect("chain lock poisoned");
        chain.insert_historical(draft, validity, id, recorded_at)
    }

    // -- reads --------------------------------------------------------------

    /// The version whose ordered position is the floor of `at`.
    ///
    /// Returns the version containing `at` when one exists; past the end of
    /// an expired chain it returns the last sealed version (its populated
    /// valid-until marks it lapsed). `NotFound` strictly means `at` predates
    /// every version or the identity is unknown.
    pub fn get_at(&self, triple: TripleId, at: DateTime<Utc>) -> Result<FactVersion, StoreError> {
        let handle = self
            .chain_handle(triple)
            .ok_or(StoreError::NotFound { triple })?;
        let chain = handle.read().expect("chain lock poisoned");
        chain.get_at(at)
    }

    /// The currently-open version, if any.
    #[must_use]
    pub fn open_head(&self, triple: TripleId) -> Option<FactVersion> {
        let handle = self.chain_handle(triple)?;
        let chain = handle.read().expect("chain lock poisoned");
        chain.open_head().cloned()
    }

    /// All versions of an identity, oldest first. `NotFound` for an unknown
    /// identity.
    pub fn history(&self, triple: TripleId) -> Result<Vec<FactVersion>, StoreError> {
        let handle = self
            .chain_handle(triple)
            .ok_or(StoreError::NotFound { triple })?;
        let chain = handle.read().expect("chain lock poisoned");
        Ok(chain.history())
    }

    /// The triple key behind an identity hash.
    #[must_use]
    pub fn key_of(&self, triple: TripleId) -> Option<TripleKey> {
        let handle = self.chain_handle(triple)?;
        let chain = handle.read().expect("chain lock poisoned");
        Some(chain.key().clone())
    }

    // -- indexes ------------------------------------------------------------

    /// Identities with the entity as subject or object, in stable order.
    #[must_use]
    pub fn triples_touching(&self, entity: EntityId) -> Vec<TripleId> {
        let mut out: BTreeSet<TripleId> = BTreeSet::new();
        if let Some(set) = self
            .by_subject
            .read()
            .expect("subject index lock poisoned")
            .get(&entity)
        {
            out.extend(set.iter().copied());
        }
        if let Some(set) = self
            .by_object
            .read()
            .expect("object index lock poisoned")
            .get(&entity)
        {
            out.extend(set.iter().copied());
        }
        out.into_iter().collect()
    }

    /// Identities carrying the predicate anywhere in the corpus, in stable
    /// order. Feeds guidance base rates.
    #[must_use]
    pub fn triples_for_predicate(&self, predicate: &str) -> Vec<TripleId> {
        self.by_predicate
            .read()
            .expect("predicate index lock poisoned")
            .get(predicate)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::ConfidenceComponents;
    use crate::entity::EntityKind;
    use crate::provenance::Provenance;
    use crate::value::Value;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn draft(value: impl Into<Value>) -> FactDraft {
        FactDraft::new(
            value.into(),
            Provenance::structured("bureau", 0.95).unwrap(),
            ConfidenceComponents::solo(0.9, 0.95),
            0.8,
        )
    }

    fn credit_key() -> TripleKey {
        TripleKey::literal(EntityId::from_name("loanA"), "creditScore")
    }

    #[test]
    fn test_upsert_then_get_at() {
        let store = FactStore::new();
        let key = credit_key();
        let triple = key.identity();

        store.upsert(&key, draft(680), t(0)).unwrap();
        store.upsert(&key, draft(710), t(30)).unwrap();

        assert_eq!(store.get_at(triple, t(15)).unwrap().value, Value::Int(680));
        assert_eq!(store.get_at(triple, t(45)).unwrap().value, Value::Int(710));
    }

    #[test]
    fn test_get_at_unknown_triple() {
        let store = FactStore::new();
        assert!(matches!(
            store.get_at(credit_key().identity(), t(0)),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_history_ordering_and_not_found() {
        let store = FactStore::new();
        let key = credit_key();

        assert!(store.history(key.identity()).is_err());

        store.upsert(&key, draft(680), t(0)).unwrap();
        store.upsert(&key, draft(710), t(30)).unwrap();
        store.upsert(&key, draft(695), t(60)).unwrap();

        let history = store.history(key.identity()).unwrap();
        let values: Vec<_> = history.iter().map(|v| v.value.clone()).collect();
        assert_eq!(
            values,
            vec![Value::Int(680), Value::Int(710), Value::Int(695)]
        );
    }

    #[test]
    fn test_upsert_if_head_happy_path_and_race() {
        let store = FactStore::new();
        let key = credit_key();
        let triple = key.identity();

        // Fresh identity: expected None succeeds.
        let first = store
            .upsert_if_head(&key, draft(680), t(0), None)
            .unwrap();

        // Stale expectation (None after a head exists) loses.
        let err = store
            .upsert_if_head(&key, draft(700), t(10), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::ConcurrentModification { .. }));

        // Correct expectation wins.
        let second = store
            .upsert_if_head(&key, draft(710), t(30), Some(first.id))
            .unwrap();
        assert_eq!(store.open_head(triple).unwrap().id, second.id);
    }

    #[test]
    fn test_upsert_if_head_unknown_triple_with_expectation() {
        let store = FactStore::new();
        let err = store
            .upsert_if_head(&credit_key(), draft(1), t(0), Some(VersionId::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConcurrentModification { actual: None, .. }
        ));
    }

    #[test]
    fn test_expire_via_store() {
        let store = FactStore::new();
        let key = credit_key();
        let triple = key.identity();

        assert!(matches!(
            store.expire(triple, t(0)),
            Err(StoreError::NothingOpen { .. })
        ));

        store.upsert(&key, draft(680), t(0)).unwrap();
        let sealed = store.expire(triple, t(20)).unwrap();
        assert_eq!(sealed.validity.until, Some(t(20)));
        assert!(store.open_head(triple).is_none());
    }

    #[test]
    fn test_insert_historical_requires_closed_interval() {
        let store = FactStore::new();
        let err = store
            .insert_historical(
                &credit_key(),
                draft(680),
                Interval::starting_at(t(0)),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
    }

    #[test]
    fn test_indexes_subject_object_predicate() {
        let store = FactStore::new();
        let loan = EntityId::from_name("loanA");
        let owner = EntityId::from_name("acme");

        let credit = TripleKey::literal(loan, "creditScore");
        let edge = TripleKey::edge(loan, "heldBy", owner);
        store.upsert(&credit, draft(680), t(0)).unwrap();
        store.upsert(&edge, draft(Value::Entity(owner)), t(0)).unwrap();

        let touching_loan = store.triples_touching(loan);
        assert_eq!(touching_loan.len(), 2);

        let touching_owner = store.triples_touching(owner);
        assert_eq!(touching_owner, vec![edge.identity()]);

        assert_eq!(
            store.triples_for_predicate("creditScore"),
            vec![credit.identity()]
        );
        assert!(store.triples_for_predicate("unknown").is_empty());
    }

    #[test]
    fn test_entity_registration_first_wins() {
        let store = FactStore::new();
        let first = Entity::named("loanA", EntityKind::Asset, t(0));
        let again = Entity::named("loanA", EntityKind::Concept, t(5));

        store.register_entity(first.clone());
        let stored = store.register_entity(again);
        assert_eq!(stored.kind, first.kind);
        assert!(store.knows_entity(first.id));
    }

    #[test]
    fn test_concurrent_writers_disjoint_identities() {
        use std::sync::Arc as StdArc;
        let store = StdArc::new(FactStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = StdArc::clone(&store);
                std::thread::spawn(move || {
                    let subject = EntityId::from_name(&format!("loan{i}"));
                    let key = TripleKey::literal(subject, "creditScore");
                    for step in 0..50i64 {
                        store
                            .upsert(&key, draft(600 + step), t(step))
                            .expect("disjoint writers never conflict");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            let subject = EntityId::from_name(&format!("loan{i}"));
            let triple = TripleKey::literal(subject, "creditScore").identity();
            assert_eq!(store.history(triple).unwrap().len(), 50);
        }
    }

    #[test]
    fn test_same_identity_writers_serialize() {
        use std::sync::Arc as StdArc;
        let store = StdArc::new(FactStore::new());
        let key = credit_key();

        // Two writers race distinct as_of values onto one identity; every
        // accepted write lands in order, every rejection is OutOfOrderWrite.
        let handles: Vec<_> = (0..2)
            .map(|w| {
                let store = StdArc::clone(&store);
                let key = key.clone();
                std::thread::spawn(move || {
                    for step in 0..50i64 {
                        let as_of = t(step * 2 + w);
                        match store.upsert(&key, draft(step), as_of) {
                            Ok(_) => {}
                            Err(StoreError::OutOfOrderWrite { .. }) => {}
                            Err(other) => panic!("unexpected error: {other:?}"),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let history = store.history(key.identity()).unwrap();
        for pair in history.windows(2) {
            assert!(pair[0].validity.from < pair[1].validity.from);
            assert!(!pair[0].validity.overlaps(&pair[1].validity));
        }
    }
}
