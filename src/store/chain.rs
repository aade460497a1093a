//! Per-identity version chains.
//!
//! Each triple identity owns one chain: an arena of versions with an ordered
//! valid-from index and an explicit head slot. Links between versions are
//! id back-references, never pointers — the arena is the only owner.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::fact::{FactDraft, FactVersion};
use crate::interval::Interval;
use crate::triple::{TripleKey, VersionId};

/// Version chain for one triple identity.
///
/// Invariant: slots referenced by `by_from` hold versions with pairwise
/// non-overlapping intervals; `head` points at the single open version when
/// one exists. Sealing a version touches only its `until` and successor
/// back-reference — value and provenance are append-only.
#[derive(Debug)]
pub(crate) struct Chain {
    key: TripleKey,
    slots: Vec<FactVersion>,
    by_from: BTreeMap<DateTime<Utc>, usize>,
    head: Option<usize>,
}

impl Chain {
    pub(crate) fn new(key: TripleKey) -> Self {
        Self {
            key,
            slots: Vec::new(),
            by_from: BTreeMap::new(),
            head: None,
        }
    }

    pub(crate) fn key(&self) -> &TripleKey {
        &self.key
    }

    /// The open version, if any.
    pub(crate) fn open_head(&self) -> Option<&FactVersion> {
        self.head.map(|idx| &self.slots[idx])
    }

    /// The latest version by valid-from, open or sealed.
    fn tail(&self) -> Option<usize> {
        self.by_from.values().next_back().copied()
    }

    /// Closes any open version at `as_of` and opens a new one.
    pub(crate) fn upsert(
        &mut self,
        draft: FactDraft,
        as_of: DateTime<Utc>,
        id: VersionId,
        recorded_at: DateTime<Utc>,
    ) -> Result<FactVersion, StoreError> {
        if let Some(head_idx) = self.head {
            let open = &self.slots[head_idx];
            if as_of <= open.validity.from {
                return Err(StoreError::OutOfOrderWrite {
                    triple: self.key.identity(),
                    attempted: as_of,
                    open: Box::new(open.clone()),
                });
            }
        } else if let Some(tail_idx) = self.tail() {
            // Chain exists but is fully sealed (expired). The new open
            // version must start at or after the sealed tail's end.
            let tail = &self.slots[tail_idx];
            let tail_end = tail.validity.until.unwrap_or(tail.validity.from);
            if as_of < tail_end || self.by_from.contains_key(&as_of) {
                return Err(StoreError::IntervalOverlap {
                    triple: self.key.identity(),
                    neighbor: Box::new(tail.clone()),
                });
            }
        }

        let predecessor = self.tail();

        let mut version = FactVersion {
            id,
            key: self.key.clone(),
            triple: self.key.identity(),
            value: draft.value,
            validity: Interval::starting_at(as_of),
            recorded_at,
            provenance: draft.provenance,
            components: draft.components,
            confidence: draft.confidence,
            supersedes: None,
            superseded_by: None,
        };

        if let Some(prev_idx) = predecessor {
            version.supersedes = Some(self.slots[prev_idx].id);
        }

        // Seal the open head, if any, now that the write is accepted.
        if let Some(head_idx) = self.head.take() {
            let prev = &mut self.slots[head_idx];
            prev.validity.until = Some(as_of);
            prev.superseded_by = Some(version.id);
        } else if let Some(prev_idx) = predecessor {
            self.slots[prev_idx].superseded_by = Some(version.id);
        }

        let idx = self.slots.len();
        self.by_from.insert(as_of, idx);
        self.head = Some(idx);
        self.slots.push(version.clone());
        Ok(version)
    }

    /// Closes the open version without replacement.
    pub(crate) fn expire(&mut self, at: DateTime<Utc>) -> Result<FactVersion, StoreError> {
        let Some(head_idx) = self.head else {
            return Err(StoreError::NothingOpen {
                triple: self.key.identity(),
            });
        };

        if at < self.slots[head_idx].validity.from {
            return Err(StoreError::OutOfOrderWrite {
                triple: self.key.identity(),
                attempted: at,
                open: Box::new(self.slots[head_idx].clone()),
            });
        }

        self.head = None;
        let version = &mut self.slots[head_idx];
        version.validity.until = Some(at);
        Ok(version.clone())
    }

    /// Inserts a sealed version into the chain's past.
    ///
    /// Both neighbors are re-validated: the insert must not overlap the
    /// version before it, the version after it, or the open head.
    pub(crate) fn insert_historical(
        &mut self,
        draft: FactDraft,
        validity: Interval,
        id: VersionId,
        recorded_at: DateTime<Utc>,
    ) -> Result<FactVersion, StoreError> {
        debug_assert!(validity.until.is_some(), "validated by the store");

        if self.by_from.contains_key(&validity.from) {
            let existing = self.by_from[&validity.from];
            return Err(StoreError::IntervalOverlap {
                triple: self.key.identity(),
                neighbor: Box::new(self.slots[existing].clone()),
            });
        }

        let prev = self
            .by_from
            .range(..validity.from)
            .next_back()
            .map(|(_, &idx)| idx);
        let next = self
            .by_from
            .range(validity.from..)
            .next()
            .map(|(_, &idx)| idx);

        for neighbor in [prev, next].into_iter().flatten() {
            if self.slots[neighbor].validity.overlaps(&validity) {
                return Err(StoreError::IntervalOverlap {
                    triple: self.key.identity(),
                    neighbor: Box::new(self.slots[neighbor].clone()),
                });
            }
        }

        let mut version = FactVersion {
            id,
            key: self.key.clone(),
            triple: self.key.identity(),
            value: draft.value,
            validity: validity.clone(),
            recorded_at,
            provenance: draft.provenance,
            components: draft.components,
            confidence: draft.confidence,
            supersedes: None,
            superseded_by: None,
        };

        // Re-link neighbor back-references around the insert.
        if let Some(prev_idx) = prev {
            version.supersedes = Some(self.slots[prev_idx].id);
            self.slots[prev_idx].superseded_by = Some(version.id);
        }
        if let Some(next_idx) = next {
            version.superseded_by = Some(self.slots[next_idx].id);
            self.slots[next_idx].supersedes = Some(version.id);
        }

        let idx = self.slots.len();
        self.by_from.insert(validity.from, idx);
        self.slots.push(version.clone());
        Ok(version)
    }

    /// The version whose valid-from is the floor of `at`.
    ///
    /// O(log n). Returns the latest version starting at or before `at` even
    /// when its interval has lapsed — a populated `until` tells the caller
    /// the fact had expired by `at`. `NotFound` means `at` predates every
    /// version.
    pub(crate) fn get_at(&self, at: DateTime<Utc>) -> Result<FactVersion, StoreError> {
        self.by_from
            .range(..=at)
            .next_back()
            .map(|(_, &idx)| self.slots[idx].clone())
            .ok_or(StoreError::NotFound {
                triple: self.key.identity(),
            })
    }

    /// All versions, oldest valid-from first.
    pub(crate) fn history(&self) -> Vec<FactVersion> {
        self.by_from
            .values()
            .map(|&idx| self.slots[idx].clone())
            .collect()
    }
}
