//! Persistent Store Contract
//!
//! The narrow set of operations the coordinator needs from durable storage.
//! Every mutation is scoped to one unit row (lease, completion marker) or to
//! one atomic chunk of derived rows, so no cross-unit transactions are needed.
//!
//! Implementations must guarantee:
//! - `range_start` / `range_end` uniqueness across units.
//! - `try_lease` and `mark_completed` are compare-and-set on a single row.
//! - `insert_digit_counts` / `insert_near_misses` apply a whole chunk or nothing.
//!   Re-inserting a row identical to a stored one is a no-op; a row that collides
//!   with a *different* stored row fails with `StoreError::UniqueViolation`.
//! - Derived rows of a unit without a completion marker are provisional:
//!   `clear_pending_rows` drops them, and a near miss held by an uncompleted unit
//!   is handed over to the unit that reports it next.

use super::types::{DigitCount, NearMiss, NewUnit, Progress, UnitId, WorkUnit};
use crate::error::StoreError;

pub trait UnitStore: Send + Sync {
    /// Creates a unit and returns its id.
    fn insert_unit(&self, unit: NewUnit) -> Result<UnitId, StoreError>;

    fn get_unit(&self, id: UnitId) -> Result<Option<WorkUnit>, StoreError>;

    /// Eligible unit with the smallest `range_start`.
    fn earliest_eligible(&self, cutoff_ms: u64) -> Result<Option<UnitId>, StoreError>;

    /// The `pick % n`-th eligible unit (ordered by `range_start`), where `n` is the
    /// number of eligible units. A uniformly random `pick` gives a uniform choice.
    fn pick_eligible(&self, cutoff_ms: u64, pick: u64) -> Result<Option<UnitId>, StoreError>;

    /// Conditional lease: succeeds only if the unit is still eligible at `cutoff_ms`.
    /// Returns the updated row, or `None` when another requester got there first.
    fn try_lease(
        &self,
        id: UnitId,
        holder: &str,
        now_ms: u64,
        cutoff_ms: u64,
    ) -> Result<Option<WorkUnit>, StoreError>;

    /// Atomically inserts one chunk. Returns how many rows were newly written.
    fn insert_digit_counts(&self, rows: &[DigitCount]) -> Result<usize, StoreError>;

    /// Atomically inserts one chunk. Returns how many rows were newly written
    /// (including rows taken over from uncompleted units).
    fn insert_near_misses(&self, rows: &[NearMiss]) -> Result<usize, StoreError>;

    /// Deletes every derived row of `id` if it is not completed yet.
    /// Returns `false` (and deletes nothing) once the unit is completed.
    fn clear_pending_rows(&self, id: UnitId) -> Result<bool, StoreError>;

    /// Sets the completion marker if the unit is not completed yet.
    /// Returns `false` when it was already completed.
    fn mark_completed(
        &self,
        id: UnitId,
        completed_by: &str,
        client_version: &str,
        completed_ms: u64,
    ) -> Result<bool, StoreError>;

    fn digit_counts(&self, id: UnitId) -> Result<Vec<DigitCount>, StoreError>;

    fn near_misses(&self, id: UnitId) -> Result<Vec<NearMiss>, StoreError>;

    fn progress(&self, cutoff_ms: u64) -> Result<Progress, StoreError>;
}

/// Structural checks shared by all backends before a unit is created.
pub(crate) fn check_new_unit(unit: &NewUnit) -> Result<(), StoreError> {
    if unit.base == 0 {
        return Err(StoreError::InvalidUnit("base must be at least 1".to_string()));
    }
    if unit.range_end <= unit.range_start {
        return Err(StoreError::InvalidUnit(format!(
            "empty range [{}, {})",
            unit.range_start, unit.range_end
        )));
    }
    Ok(())
}
