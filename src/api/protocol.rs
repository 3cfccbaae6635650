//! HTTP Protocol Definitions
//!
//! JSON request/response shapes spoken with workers. Field names follow the worker
//! client's existing contract (`search_id`, `unique_count`, `near_misses`, ...), so
//! they differ from the core's internal naming.

use crate::registry::types::{LeaseView, UnitId};
use crate::submission::types::Submission;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENDPOINT_CLAIM: &str = "/claim";
pub const ENDPOINT_SUBMIT: &str = "/submit";
pub const ENDPOINT_STATS: &str = "/stats";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClaimParams {
    pub username: Option<String>,
}

/// A granted lease. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimResponse {
    pub search_id: u64,
    pub base: u32,
    pub search_start: u64,
    pub search_end: u64,
    pub claimed_time: u64,
    pub claimed_by: String,
    pub expiration_time: u64,
}

impl From<LeaseView> for ClaimResponse {
    fn from(view: LeaseView) -> Self {
        Self {
            search_id: view.unit_id.0,
            base: view.base,
            search_start: view.range_start,
            search_end: view.range_end,
            claimed_time: view.lease_time,
            claimed_by: view.lease_holder,
            expiration_time: view.expiration_time,
        }
    }
}

/// A worker's result report.
///
/// JSON object keys are strings; serde parses `"7"` into the numeric map keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub search_id: Option<u64>,
    pub username: Option<String>,
    pub client_version: Option<String>,
    /// Digit key -> count.
    #[serde(default)]
    pub unique_count: BTreeMap<u32, u64>,
    /// Near-miss number -> digit key at the match.
    #[serde(default)]
    pub near_misses: BTreeMap<u64, u32>,
}

impl From<SubmitRequest> for Submission {
    fn from(req: SubmitRequest) -> Self {
        Self {
            unit_id: req.search_id.map(UnitId),
            requester: req.username,
            digit_counts: req.unique_count,
            near_misses: req.near_misses,
            client_version: req.client_version,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub message: String,
}

/// Body of every non-200 response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Whether the same request may succeed later unchanged.
    pub retryable: bool,
}
