use crate::registry::types::{UnitId, ANONYMOUS, UNKNOWN_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A worker's result report for one unit, as handed to the core.
///
/// Maps are ordered so chunked inserts are identical across retries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub unit_id: Option<UnitId>,
    pub requester: Option<String>,
    /// Digit key -> count.
    pub digit_counts: BTreeMap<u32, u64>,
    /// Near-miss number -> digit key at the match.
    pub near_misses: BTreeMap<u64, u32>,
    pub client_version: Option<String>,
}

impl Submission {
    pub fn completed_by(&self) -> &str {
        match self.requester.as_deref() {
            Some(requester) if !requester.trim().is_empty() => requester,
            _ => ANONYMOUS,
        }
    }

    pub fn client_version(&self) -> &str {
        match self.client_version.as_deref() {
            Some(version) if !version.trim().is_empty() => version,
            _ => UNKNOWN_VERSION,
        }
    }
}

/// What a successful commit wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Digit-count rows newly inserted (rows already present from a retry are not counted).
    pub digit_rows: usize,
    pub near_miss_rows: usize,
}
