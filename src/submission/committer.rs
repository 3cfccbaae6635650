//! Completion Committer
//!
//! Persists an accepted submission: digit counts, then near misses, both in fixed-size
//! chunks, and finally the unit's completion marker. Each chunk is atomic in the store.
//!
//! Rows of a unit without a completion marker are provisional. A commit starts by
//! discarding whatever an earlier, failed attempt left behind, and a commit rejected
//! with `Conflict` discards its own rows, so a bad submission never blocks the next
//! one. Within a commit, retried chunks are harmless: rows identical to stored ones
//! are skipped by the store. Commits for the same unit are serialized.

use super::types::CommitReport;
use crate::error::CoordinatorError;
use crate::registry::store::UnitStore;
use crate::registry::types::{DigitCount, NearMiss, UnitId};
use crate::retry::RetryPolicy;

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Rows per chunk; keeps each statement under SQLite's default variable limit.
pub const DEFAULT_CHUNK_SIZE: usize = 999;

const COMMIT_STRIPES: usize = 64;

pub struct CompletionCommitter {
    store: Arc<dyn UnitStore>,
    retry: RetryPolicy,
    chunk_size: usize,
    /// Unit id modulo stripe count -> commit lock.
    unit_locks: Vec<Mutex<()>>,
}

impl CompletionCommitter {
    pub fn new(store: Arc<dyn UnitStore>, retry: RetryPolicy, chunk_size: usize) -> Self {
        Self {
            store,
            retry,
            chunk_size: chunk_size.max(1),
            unit_locks: (0..COMMIT_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn unit_lock(&self, unit_id: UnitId) -> &Mutex<()> {
        &self.unit_locks[(unit_id.0 % COMMIT_STRIPES as u64) as usize]
    }

    /// Writes every derived row for `unit_id`, then marks it completed.
    ///
    /// Returns `AlreadyCompleted` if a concurrent submission set the marker first.
    pub async fn commit(
        &self,
        unit_id: UnitId,
        digit_counts: &BTreeMap<u32, u64>,
        near_misses: &BTreeMap<u64, u32>,
        completed_by: &str,
        client_version: &str,
        completed_ms: u64,
    ) -> Result<CommitReport, CoordinatorError> {
        let _unit_guard = self.unit_lock(unit_id).lock().await;

        let store = self.store.clone();
        let open = self
            .retry
            .run("clear_pending_rows", move || store.clear_pending_rows(unit_id))
            .await?;
        if !open {
            tracing::debug!(unit_id = %unit_id, "Unit completed before the commit started");
            return Err(CoordinatorError::AlreadyCompleted);
        }

        let report = match self
            .insert_derived_rows(unit_id, digit_counts, near_misses)
            .await
        {
            Ok(report) => report,
            Err(e @ CoordinatorError::Conflict(_)) => {
                self.discard_pending_rows(unit_id).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let store = self.store.clone();
        let completed_by = completed_by.to_string();
        let client_version = client_version.to_string();
        let marked = self
            .retry
            .run("mark_completed", move || {
                store.mark_completed(unit_id, &completed_by, &client_version, completed_ms)
            })
            .await?;

        if !marked {
            tracing::warn!(unit_id = %unit_id, "Unit was completed by a concurrent submission");
            return Err(CoordinatorError::AlreadyCompleted);
        }

        tracing::debug!(
            unit_id = %unit_id,
            digit_rows = report.digit_rows,
            near_miss_rows = report.near_miss_rows,
            "Committed submission"
        );
        Ok(report)
    }

    /// Chunked, idempotent insertion of the derived rows (no completion marker).
    async fn insert_derived_rows(
        &self,
        unit_id: UnitId,
        digit_counts: &BTreeMap<u32, u64>,
        near_misses: &BTreeMap<u64, u32>,
    ) -> Result<CommitReport, CoordinatorError> {
        let digit_rows: Vec<DigitCount> = digit_counts
            .iter()
            .map(|(&key, &count)| DigitCount {
                unit_id,
                key,
                count,
            })
            .collect();

        let near_miss_rows: Vec<NearMiss> = near_misses
            .iter()
            .map(|(&number, &key_at_match)| NearMiss {
                unit_id,
                number,
                key_at_match,
            })
            .collect();

        let mut report = CommitReport::default();

        for chunk in digit_rows.chunks(self.chunk_size) {
            let store = self.store.clone();
            let chunk = chunk.to_vec();
            report.digit_rows += self
                .retry
                .run("insert_digit_counts", move || store.insert_digit_counts(&chunk))
                .await?;
        }

        for chunk in near_miss_rows.chunks(self.chunk_size) {
            let store = self.store.clone();
            let chunk = chunk.to_vec();
            report.near_miss_rows += self
                .retry
                .run("insert_near_misses", move || store.insert_near_misses(&chunk))
                .await?;
        }

        Ok(report)
    }

    async fn discard_pending_rows(&self, unit_id: UnitId) {
        let store = self.store.clone();
        match self
            .retry
            .run("clear_pending_rows", move || store.clear_pending_rows(unit_id))
            .await
        {
            Ok(_) => tracing::debug!(unit_id = %unit_id, "Discarded rows of a conflicting submission"),
            Err(e) => tracing::warn!(
                unit_id = %unit_id,
                "Rows of a conflicting submission stay until the next commit: {}",
                e
            ),
        }
    }
}
