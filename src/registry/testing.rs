//! Test doubles for the store contract.

use super::memory::MemoryStore;
use super::store::UnitStore;
use super::types::*;
use crate::error::StoreError;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Wraps a `MemoryStore` and injects transient `Busy` failures on demand.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    /// Selection and lease calls that fail before touching the store.
    busy_claims: AtomicUsize,
    /// Chunk inserts that succeed in the store but report `Busy` (lost acknowledgement).
    lost_insert_acks: AtomicUsize,
    /// Completion marker writes that fail before touching the store.
    busy_completions: AtomicUsize,
    pub insert_calls: AtomicUsize,
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

fn busy() -> StoreError {
    StoreError::Busy("database is locked".to_string())
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_claims(&self, times: usize) {
        self.busy_claims.store(times, Ordering::SeqCst);
    }

    pub fn lose_insert_acks(&self, times: usize) {
        self.lost_insert_acks.store(times, Ordering::SeqCst);
    }

    pub fn fail_completions(&self, times: usize) {
        self.busy_completions.store(times, Ordering::SeqCst);
    }
}

impl UnitStore for FlakyStore {
    fn insert_unit(&self, unit: NewUnit) -> Result<UnitId, StoreError> {
        self.inner.insert_unit(unit)
    }

    fn get_unit(&self, id: UnitId) -> Result<Option<WorkUnit>, StoreError> {
        self.inner.get_unit(id)
    }

    fn earliest_eligible(&self, cutoff_ms: u64) -> Result<Option<UnitId>, StoreError> {
        if take(&self.busy_claims) {
            return Err(busy());
        }
        self.inner.earliest_eligible(cutoff_ms)
    }

    fn pick_eligible(&self, cutoff_ms: u64, pick: u64) -> Result<Option<UnitId>, StoreError> {
        if take(&self.busy_claims) {
            return Err(busy());
        }
        self.inner.pick_eligible(cutoff_ms, pick)
    }

    fn try_lease(
        &self,
        id: UnitId,
        holder: &str,
        now_ms: u64,
        cutoff_ms: u64,
    ) -> Result<Option<WorkUnit>, StoreError> {
        if take(&self.busy_claims) {
            return Err(busy());
        }
        self.inner.try_lease(id, holder, now_ms, cutoff_ms)
    }

    fn insert_digit_counts(&self, rows: &[DigitCount]) -> Result<usize, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let inserted = self.inner.insert_digit_counts(rows)?;
        if take(&self.lost_insert_acks) {
            return Err(busy());
        }
        Ok(inserted)
    }

    fn insert_near_misses(&self, rows: &[NearMiss]) -> Result<usize, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let inserted = self.inner.insert_near_misses(rows)?;
        if take(&self.lost_insert_acks) {
            return Err(busy());
        }
        Ok(inserted)
    }

    fn clear_pending_rows(&self, id: UnitId) -> Result<bool, StoreError> {
        self.inner.clear_pending_rows(id)
    }

    fn mark_completed(
        &self,
        id: UnitId,
        completed_by: &str,
        client_version: &str,
        completed_ms: u64,
    ) -> Result<bool, StoreError> {
        if take(&self.busy_completions) {
            return Err(busy());
        }
        self.inner
            .mark_completed(id, completed_by, client_version, completed_ms)
    }

    fn digit_counts(&self, id: UnitId) -> Result<Vec<DigitCount>, StoreError> {
        self.inner.digit_counts(id)
    }

    fn near_misses(&self, id: UnitId) -> Result<Vec<NearMiss>, StoreError> {
        self.inner.near_misses(id)
    }

    fn progress(&self, cutoff_ms: u64) -> Result<Progress, StoreError> {
        self.inner.progress(cutoff_ms)
    }
}
