use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity recorded when a requester does not name itself.
pub const ANONYMOUS: &str = "anonymous";

/// Client version recorded when a submission does not carry one.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Stable identifier of a work unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A contiguous subrange `[range_start, range_end)` of the search space.
///
/// Lease fields are written by the allocator, completion fields by the committer.
/// Once `completed_time` is set the unit is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkUnit {
    pub id: UnitId,
    /// Determines the expected digit keys `1..=base` of a submission.
    pub base: u32,
    pub range_start: u64,
    pub range_end: u64,
    /// Number of values a complete submission must account for.
    pub range_size: u64,
    pub lease_holder: Option<String>,
    /// Unix ms when the current lease was granted.
    pub lease_time: Option<u64>,
    pub completed_by: Option<String>,
    /// Unix ms when the accepted submission was received.
    pub completed_time: Option<u64>,
    pub client_version: Option<String>,
}

impl WorkUnit {
    pub fn is_completed(&self) -> bool {
        self.completed_time.is_some()
    }

    /// A unit is eligible when it is not completed and either never leased or
    /// leased strictly before `cutoff` (`now - lease_duration`).
    pub fn is_eligible(&self, cutoff_ms: u64) -> bool {
        if self.is_completed() {
            return false;
        }
        match self.lease_time {
            None => true,
            Some(leased_at) => leased_at < cutoff_ms,
        }
    }
}

/// Provisioning input for a new unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUnit {
    pub base: u32,
    pub range_start: u64,
    pub range_end: u64,
    /// Overrides `range_end - range_start` when the unit defines its own size.
    pub range_size: Option<u64>,
}

impl NewUnit {
    pub fn effective_size(&self) -> u64 {
        self.range_size
            .unwrap_or_else(|| self.range_end.saturating_sub(self.range_start))
    }
}

/// Per-digit tally of a completed unit. `(unit_id, key)` is unique.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DigitCount {
    pub unit_id: UnitId,
    pub key: u32,
    pub count: u64,
}

/// A noteworthy value reported with a unit. `number` is unique across all units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NearMiss {
    pub unit_id: UnitId,
    pub number: u64,
    pub key_at_match: u32,
}

/// What a successful claim hands back to the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaseView {
    pub unit_id: UnitId,
    pub base: u32,
    pub range_start: u64,
    pub range_end: u64,
    pub lease_time: u64,
    pub lease_holder: String,
    pub expiration_time: u64,
}

impl LeaseView {
    /// Builds the view from a freshly leased unit. Returns `None` if the unit
    /// carries no lease.
    pub fn from_unit(unit: &WorkUnit, lease_duration_ms: u64) -> Option<Self> {
        let lease_time = unit.lease_time?;
        let lease_holder = unit.lease_holder.clone()?;
        Some(Self {
            unit_id: unit.id,
            base: unit.base,
            range_start: unit.range_start,
            range_end: unit.range_end,
            lease_time,
            lease_holder,
            expiration_time: lease_time.saturating_add(lease_duration_ms),
        })
    }
}

/// Snapshot of registry progress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub total: u64,
    /// Units holding an unexpired lease and not yet completed.
    pub leased: u64,
    pub completed: u64,
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Lease cutoff for eligibility: leases granted before this instant are stale.
pub fn lease_cutoff(now_ms: u64, lease_duration_ms: u64) -> u64 {
    now_ms.saturating_sub(lease_duration_ms)
}
