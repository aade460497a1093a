//! The Temporal Query Layer.
//!
//! Read-only views over the fact store: point-in-time snapshots, N-hop
//! neighborhoods, change detection between two instants, and bucketed
//! trends. Reads never block writers; every query observes a
//! consistent-at-call-time view because versions are keyed by valid time
//! and the store is append-only.
//!
//! `diff` and `trend` accept a [`CancelToken`] checked between
//! per-identity/per-bucket batches. Cancellation is all-or-nothing: a
//! cancelled call returns an error, never partial results.

mod diff;
mod snapshot;
mod trend;

pub use diff::{ChangeEvent, ChangeKind};
pub use snapshot::Snapshot;
pub use trend::TrendPoint;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::entity::EntityId;
use crate::error::QueryError;
use crate::interval::Interval;
use crate::store::FactStore;
use crate::triple::TripleId;

/// How many identities/buckets are processed between cancellation checks.
const CANCEL_BATCH: usize = 64;

/// Cooperative cancellation handle for long-running queries.
///
/// Cloning shares the flag; any clone can cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Read-only query surface over a [`FactStore`].
#[derive(Debug, Clone)]
pub struct QueryLayer {
    store: Arc<FactStore>,
}

impl QueryLayer {
    /// Creates a query layer over the store.
    #[must_use]
    pub fn new(store: Arc<FactStore>) -> Self {
        Self { store }
    }

    /// The induced subgraph of `entity` at `at`: every triple with the
    /// entity as subject or object whose interval contains `at`.
    ///
    /// An unknown entity yields an empty snapshot — absence of facts, not an
    /// error.
    #[must_use]
    pub fn snapshot(&self, entity: EntityId, at: DateTime<Utc>) -> Snapshot {
        let mut snap = Snapshot::empty(entity, at);
        self.collect_live(entity, at, &mut snap);
        snap
    }

    /// Snapshot expanded across entity-valued edges up to `hops` hops.
    ///
    /// `hops = 0` is [`Self::snapshot`]. Expansion follows edge triples in
    /// both directions and is bounded by the visited set, so cycles
    /// terminate.
    #[must_use]
    pub fn neighborhood(&self, entity: EntityId, at: DateTime<Utc>, hops: usize) -> Snapshot {
        let mut snap = Snapshot::empty(entity, at);
        let mut visited: BTreeSet<EntityId> = BTreeSet::new();
        let mut frontier: BTreeSet<EntityId> = BTreeSet::from([entity]);

        for _ in 0..=hops {
            let mut next: BTreeSet<EntityId> = BTreeSet::new();
            for &node in &frontier {
                if !visited.insert(node) {
                    continue;
                }
                self.collect_live(node, at, &mut snap);
            }
            for fact in snap.facts.values() {
                next.insert(fact.key.subject);
                if let Some(target) = fact.key.object_entity() {
                    next.insert(target);
                }
                if let Some(target) = fact.value.as_entity() {
                    next.insert(target);
                }
            }
            frontier = next.difference(&visited).copied().collect();
            if frontier.is_empty() {
                break;
            }
        }
        snap
    }

    fn collect_live(&self, entity: EntityId, at: DateTime<Utc>, snap: &mut Snapshot) {
        for triple in self.store.triples_touching(entity) {
            if snap.facts.contains_key(&triple) {
                continue;
            }
            if let Ok(version) = self.store.get_at(triple, at) {
                if version.is_live_at(at) {
                    snap.facts.insert(triple, version);
                }
            }
        }
    }

    /// Changes on `entity`'s subgraph between instants `a` and `b`.
    ///
    /// Computed by set-comparing the two snapshots by triple identity with
    /// semantic value equality. Events come back in stable identity order.
    /// Swapping `a` and `b` returns the same set with added/removed inverted
    /// and before/after swapped; `diff(e, t, t)` is always empty.
    pub fn diff(
        &self,
        entity: EntityId,
        a: DateTime<Utc>,
        b: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Vec<ChangeEvent>, QueryError> {
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        let old = self.snapshot(entity, a);
        let new = self.snapshot(entity, b);

        let identities: BTreeSet<TripleId> = old
            .facts
            .keys()
            .chain(new.facts.keys())
            .copied()
            .collect();

        let mut events = Vec::new();
        for (processed, triple) in identities.into_iter().enumerate() {
            if processed % CANCEL_BATCH == 0 && cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }

            let before = old.fact(triple);
            let after = new.fact(triple);
            let event = match (before, after) {
                (None, Some(new_fact)) => ChangeEvent {
                    triple,
                    key: new_fact.key.clone(),
                    before: None,
                    after: Some(new_fact.value.clone()),
                    kind: ChangeKind::Added,
                },
                (Some(old_fact), None) => ChangeEvent {
                    triple,
                    key: old_fact.key.clone(),
                    before: Some(old_fact.value.clone()),
                    after: None,
                    kind: ChangeKind::Removed,
                },
                (Some(old_fact), Some(new_fact)) => {
                    if old_fact.value.semantically_eq(&new_fact.value) {
                        continue;
                    }
                    ChangeEvent {
                        triple,
                        key: new_fact.key.clone(),
                        before: Some(old_fact.value.clone()),
                        after: Some(new_fact.value.clone()),
                        kind: ChangeKind::Modified,
                    }
                }
                (None, None) => continue,
            };
            events.push(event);
        }
        Ok(events)
    }

    /// Bucketed trend of a numeric identity over a closed range.
    ///
    /// One [`TrendPoint`] per bucket where a value was open at the bucket's
    /// end; buckets before the first version or inside a gap are skipped.
    ///
    /// # Errors
    ///
    /// `EmptyTrendRange` for an open range or non-positive bucket;
    /// `NonNumericTrend` the moment a bucket lands on a non-numeric value;
    /// `Cancelled` on cooperative cancellation (no partial results).
    pub fn trend(
        &self,
        triple: TripleId,
        range: &Interval,
        bucket: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<TrendPoint>, QueryError> {
        let Some(range_end) = range.until else {
            return Err(QueryError::EmptyTrendRange);
        };
        if bucket <= Duration::zero() || range_end <= range.from {
            return Err(QueryError::EmptyTrendRange);
        }

        let mut points = Vec::new();
        let mut bucket_start = range.from;
        let mut processed = 0usize;
        while bucket_start < range_end {
            if processed % CANCEL_BATCH == 0 && cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            processed += 1;

            let bucket_end = bucket_start + bucket;
            if let Ok(version) = self.store.get_at(triple, bucket_end) {
                if version.is_live_at(bucket_end) {
                    let Some(value) = version.value.as_float() else {
                        return Err(QueryError::NonNumericTrend {
                            triple,
                            type_name: version.value.type_name(),
                            at: bucket_end,
                        });
                    };
                    points.push(TrendPoint {
                        bucket_start,
                        value,
                    });
                }
            }
            bucket_start = bucket_end;
        }
        Ok(points)
    }
}
