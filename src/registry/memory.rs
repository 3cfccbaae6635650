//! In-Memory Unit Store
//!
//! `DashMap`-backed implementation of `UnitStore`. Row-level compare-and-set relies on
//! the shard write lock held by `get_mut`. Chunk inserts, unit creation, row clearing
//! and completion markers are serialized by a single write lock, so each chunk lands
//! all-or-nothing against a stable view of which units are completed.

use super::store::{check_new_unit, UnitStore};
use super::types::*;
use crate::error::StoreError;

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

pub struct MemoryStore {
    units: DashMap<UnitId, WorkUnit>,
    /// Uniqueness indexes: `range_start -> UnitId`, `range_end -> UnitId`.
    starts: DashMap<u64, UnitId>,
    ends: DashMap<u64, UnitId>,
    /// `(unit, key) -> count`.
    digit_counts: DashMap<(UnitId, u32), u64>,
    /// `number -> row`.
    near_misses: DashMap<u64, NearMiss>,
    next_id: AtomicU64,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            units: DashMap::new(),
            starts: DashMap::new(),
            ends: DashMap::new(),
            digit_counts: DashMap::new(),
            near_misses: DashMap::new(),
            next_id: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Backend("memory store write lock poisoned".to_string()))
    }

    fn eligible_by_start(&self, cutoff_ms: u64) -> Vec<(u64, UnitId)> {
        let mut eligible: Vec<(u64, UnitId)> = self
            .units
            .iter()
            .filter(|entry| entry.value().is_eligible(cutoff_ms))
            .map(|entry| (entry.value().range_start, *entry.key()))
            .collect();
        eligible.sort_unstable();
        eligible
    }

    fn is_completed(&self, id: UnitId) -> bool {
        self.units
            .get(&id)
            .map(|unit| unit.is_completed())
            .unwrap_or(false)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitStore for MemoryStore {
    fn insert_unit(&self, unit: NewUnit) -> Result<UnitId, StoreError> {
        check_new_unit(&unit)?;
        let _guard = self.lock_writes()?;

        if self.starts.contains_key(&unit.range_start) {
            return Err(StoreError::UniqueViolation(format!(
                "range_start {} already exists",
                unit.range_start
            )));
        }
        if self.ends.contains_key(&unit.range_end) {
            return Err(StoreError::UniqueViolation(format!(
                "range_end {} already exists",
                unit.range_end
            )));
        }

        let id = UnitId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.starts.insert(unit.range_start, id);
        self.ends.insert(unit.range_end, id);
        self.units.insert(
            id,
            WorkUnit {
                id,
                base: unit.base,
                range_start: unit.range_start,
                range_end: unit.range_end,
                range_size: unit.effective_size(),
                lease_holder: None,
                lease_time: None,
                completed_by: None,
                completed_time: None,
                client_version: None,
            },
        );

        tracing::debug!(unit_id = %id, "Created unit [{}, {})", unit.range_start, unit.range_end);
        Ok(id)
    }

    fn get_unit(&self, id: UnitId) -> Result<Option<WorkUnit>, StoreError> {
        Ok(self.units.get(&id).map(|entry| entry.value().clone()))
    }

    fn earliest_eligible(&self, cutoff_ms: u64) -> Result<Option<UnitId>, StoreError> {
        Ok(self
            .units
            .iter()
            .filter(|entry| entry.value().is_eligible(cutoff_ms))
            .min_by_key(|entry| entry.value().range_start)
            .map(|entry| *entry.key()))
    }

    fn pick_eligible(&self, cutoff_ms: u64, pick: u64) -> Result<Option<UnitId>, StoreError> {
        let eligible = self.eligible_by_start(cutoff_ms);
        if eligible.is_empty() {
            return Ok(None);
        }
        let index = (pick % eligible.len() as u64) as usize;
        Ok(Some(eligible[index].1))
    }

    fn try_lease(
        &self,
        id: UnitId,
        holder: &str,
        now_ms: u64,
        cutoff_ms: u64,
    ) -> Result<Option<WorkUnit>, StoreError> {
        // The shard write lock makes check-and-set a single step.
        let Some(mut unit) = self.units.get_mut(&id) else {
            return Ok(None);
        };
        if !unit.is_eligible(cutoff_ms) {
            return Ok(None);
        }
        unit.lease_holder = Some(holder.to_string());
        unit.lease_time = Some(now_ms);
        Ok(Some(unit.value().clone()))
    }

    fn insert_digit_counts(&self, rows: &[DigitCount]) -> Result<usize, StoreError> {
        let _guard = self.lock_writes()?;

        // Validate the whole chunk before touching anything.
        let mut fresh = Vec::with_capacity(rows.len());
        for row in rows {
            match self.digit_counts.get(&(row.unit_id, row.key)) {
                Some(existing) if *existing == row.count => {}
                Some(existing) => {
                    return Err(StoreError::UniqueViolation(format!(
                        "digit count ({}, {}) already stored as {} (got {})",
                        row.unit_id,
                        row.key,
                        *existing,
                        row.count
                    )));
                }
                None => fresh.push(row),
            }
        }

        for row in &fresh {
            self.digit_counts.insert((row.unit_id, row.key), row.count);
        }
        Ok(fresh.len())
    }

    fn insert_near_misses(&self, rows: &[NearMiss]) -> Result<usize, StoreError> {
        let _guard = self.lock_writes()?;

        let mut fresh = Vec::with_capacity(rows.len());
        for row in rows {
            match self.near_misses.get(&row.number) {
                Some(existing) if *existing == *row => {}
                Some(existing) if !self.is_completed(existing.unit_id) => fresh.push(row),
                Some(existing) => {
                    return Err(StoreError::UniqueViolation(format!(
                        "near miss {} already reported by unit {}",
                        row.number,
                        existing.unit_id
                    )));
                }
                None => fresh.push(row),
            }
        }

        for row in &fresh {
            self.near_misses.insert(row.number, **row);
        }
        Ok(fresh.len())
    }

    fn mark_completed(
        &self,
        id: UnitId,
        completed_by: &str,
        client_version: &str,
        completed_ms: u64,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock_writes()?;
        let Some(mut unit) = self.units.get_mut(&id) else {
            return Err(StoreError::Backend(format!("unit {} does not exist", id)));
        };
        if unit.is_completed() {
            return Ok(false);
        }
        unit.completed_by = Some(completed_by.to_string());
        unit.client_version = Some(client_version.to_string());
        unit.completed_time = Some(completed_ms);
        Ok(true)
    }

    fn clear_pending_rows(&self, id: UnitId) -> Result<bool, StoreError> {
        let _guard = self.lock_writes()?;
        match self.units.get(&id) {
            None => return Err(StoreError::Backend(format!("unit {} does not exist", id))),
            Some(unit) if unit.is_completed() => return Ok(false),
            Some(_) => {}
        }
        self.digit_counts.retain(|(unit_id, _), _| *unit_id != id);
        self.near_misses.retain(|_, row| row.unit_id != id);
        Ok(true)
    }

    fn digit_counts(&self, id: UnitId) -> Result<Vec<DigitCount>, StoreError> {
        let mut rows: Vec<DigitCount> = self
            .digit_counts
            .iter()
            .filter(|entry| entry.key().0 == id)
            .map(|entry| DigitCount {
                unit_id: id,
                key: entry.key().1,
                count: *entry.value(),
            })
            .collect();
        rows.sort_by_key(|row| row.key);
        Ok(rows)
    }

    fn near_misses(&self, id: UnitId) -> Result<Vec<NearMiss>, StoreError> {
        let mut rows: Vec<NearMiss> = self
            .near_misses
            .iter()
            .filter(|entry| entry.value().unit_id == id)
            .map(|entry| *entry.value())
            .collect();
        rows.sort_by_key(|row| row.number);
        Ok(rows)
    }

    fn progress(&self, cutoff_ms: u64) -> Result<Progress, StoreError> {
        let mut progress = Progress::default();
        for entry in self.units.iter() {
            let unit = entry.value();
            progress.total += 1;
            if unit.is_completed() {
                progress.completed += 1;
            } else if !unit.is_eligible(cutoff_ms) {
                progress.leased += 1;
            }
        }
        Ok(progress)
    }
}
