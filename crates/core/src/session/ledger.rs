//! Per-batch bookkeeping for one session generation.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{BatchIndex, Payload};

/// Tracks every batch index as pending, in flight or processed.
///
/// An index lives in exactly one of the three collections. Failed indices are
/// additionally recorded in `missing`, which is always a subset of `processed`.
#[derive(Debug, Default, Clone)]
pub struct WorkLedger {
    pending: BTreeMap<BatchIndex, Payload>,
    in_flight: BTreeSet<BatchIndex>,
    processed: BTreeSet<BatchIndex>,
    missing: BTreeSet<BatchIndex>,
    lowest_unprocessed: BatchIndex,
}

impl WorkLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the index was ever enqueued in this generation.
    pub fn has_seen(&self, index: BatchIndex) -> bool {
        self.pending.contains_key(&index)
            || self.in_flight.contains(&index)
            || self.processed.contains(&index)
    }

    /// Queues a batch. Returns false if the index was already seen.
    pub fn enqueue(&mut self, index: BatchIndex, payload: Payload) -> bool {
        if self.has_seen(index) {
            return false;
        }
        self.pending.insert(index, payload);
        true
    }

    /// Moves up to `slots` pending batches, lowest index first, to in flight.
    pub fn take_dispatchable(&mut self, slots: usize) -> Vec<(BatchIndex, Payload)> {
        let mut taken = Vec::with_capacity(slots.min(self.pending.len()));
        while taken.len() < slots {
            let Some((index, payload)) = self.pending.pop_first() else {
                break;
            };
            self.in_flight.insert(index);
            taken.push((index, payload));
        }
        taken
    }

    /// Records the outcome of an in-flight batch.
    ///
    /// Returns false if the index was not in flight (nothing changes).
    pub fn complete(&mut self, index: BatchIndex, succeeded: bool) -> bool {
        if !self.in_flight.remove(&index) {
            return false;
        }
        self.processed.insert(index);
        if !succeeded {
            self.missing.insert(index);
        }
        self.recompute_lowest_unprocessed();
        true
    }

    fn recompute_lowest_unprocessed(&mut self) {
        let mut index = 0;
        while self.processed.contains(&index) {
            index += 1;
        }
        self.lowest_unprocessed = index;
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// No batch is pending or in flight.
    pub fn is_quiescent(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    /// Whether every index in `[0, last_index)` has been enqueued. Stops at the
    /// first gap.
    pub fn all_seen(&self, last_index: BatchIndex) -> bool {
        (0..last_index).all(|i| self.has_seen(i))
    }

    /// Expected indices in `[0, last_index)` the ledger has never heard of.
    pub fn unaccounted(&self, last_index: BatchIndex) -> Vec<BatchIndex> {
        (0..last_index).filter(|i| !self.has_seen(*i)).collect()
    }

    /// Indices the terminal step must treat as unavailable: every failed
    /// batch, plus every expected index without a successful result.
    pub fn missing_for(&self, last_index: BatchIndex) -> Vec<BatchIndex> {
        let mut missing = self.missing.clone();
        missing.extend((0..last_index).filter(|i| !self.processed.contains(i)));
        missing.into_iter().collect()
    }

    /// Successfully processed indices, ascending.
    pub fn succeeded(&self) -> Vec<BatchIndex> {
        self.processed.difference(&self.missing).copied().collect()
    }

    pub fn processed(&self) -> Vec<BatchIndex> {
        self.processed.iter().copied().collect()
    }

    pub fn pending(&self) -> Vec<BatchIndex> {
        self.pending.keys().copied().collect()
    }

    pub fn in_flight(&self) -> Vec<BatchIndex> {
        self.in_flight.iter().copied().collect()
    }

    pub fn missing(&self) -> Vec<BatchIndex> {
        self.missing.iter().copied().collect()
    }

    pub fn lowest_unprocessed(&self) -> BatchIndex {
        self.lowest_unprocessed
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
