//! Coordinator Facade
//!
//! The two operations the outside world calls, `claim_next` and `submit_result`,
//! plus a progress snapshot. Holds no mutable state of its own: everything shared
//! lives in the `UnitStore`, so any number of callers may run concurrently.

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::lease::allocator::LeaseAllocator;
use crate::registry::store::UnitStore;
use crate::registry::types::*;
use crate::retry::RetryPolicy;
use crate::submission::committer::CompletionCommitter;
use crate::submission::types::{CommitReport, Submission};
use crate::submission::validator::SubmissionValidator;

use std::sync::Arc;

pub struct Coordinator {
    store: Arc<dyn UnitStore>,
    allocator: LeaseAllocator,
    validator: SubmissionValidator,
    committer: CompletionCommitter,
    retry: RetryPolicy,
    lease_duration_ms: u64,
}

impl Coordinator {
    pub fn new(store: Arc<dyn UnitStore>, config: CoordinatorConfig) -> Self {
        let allocator = LeaseAllocator::new(
            store.clone(),
            config.selection,
            config.retry.clone(),
            config.lease_duration,
        );
        Self::from_parts(store, config, allocator, SubmissionValidator::new())
    }

    /// Assembles a coordinator from pre-built components (custom RNG or near-miss check).
    pub fn from_parts(
        store: Arc<dyn UnitStore>,
        config: CoordinatorConfig,
        allocator: LeaseAllocator,
        validator: SubmissionValidator,
    ) -> Self {
        let committer = CompletionCommitter::new(
            store.clone(),
            config.retry.clone(),
            config.insert_chunk_size,
        );
        Self {
            store,
            allocator,
            validator,
            committer,
            retry: config.retry,
            lease_duration_ms: config.lease_duration.as_millis() as u64,
        }
    }

    pub async fn claim_next(&self, requester: &str) -> Result<LeaseView, CoordinatorError> {
        self.allocator.claim_next(requester).await
    }

    pub async fn claim_next_at(
        &self,
        requester: &str,
        now_ms: u64,
    ) -> Result<LeaseView, CoordinatorError> {
        self.allocator.claim_next_at(requester, now_ms).await
    }

    pub async fn submit_result(
        &self,
        submission: Submission,
    ) -> Result<CommitReport, CoordinatorError> {
        self.submit_result_at(submission, now_ms()).await
    }

    /// Validates and commits `submission`. `received_ms` becomes the unit's
    /// `completed_time`, captured before any rows are written.
    pub async fn submit_result_at(
        &self,
        submission: Submission,
        received_ms: u64,
    ) -> Result<CommitReport, CoordinatorError> {
        let current = match submission.unit_id {
            Some(unit_id) => {
                let store = self.store.clone();
                self.retry
                    .run("load_unit", move || store.get_unit(unit_id))
                    .await?
            }
            None => None,
        };

        let unit = match self.validator.validate(current.as_ref(), &submission) {
            Ok(unit) => unit,
            Err(e) => {
                tracing::warn!(
                    unit_id = ?submission.unit_id,
                    requester = submission.completed_by(),
                    "Rejected submission: {}",
                    e
                );
                return Err(e);
            }
        };

        let report = self
            .committer
            .commit(
                unit.id,
                &submission.digit_counts,
                &submission.near_misses,
                submission.completed_by(),
                submission.client_version(),
                received_ms,
            )
            .await?;

        tracing::info!(
            unit_id = %unit.id,
            requester = submission.completed_by(),
            client_version = submission.client_version(),
            "Submission accepted"
        );
        Ok(report)
    }

    pub async fn progress(&self) -> Result<Progress, CoordinatorError> {
        self.progress_at(now_ms()).await
    }

    pub async fn progress_at(&self, now_ms: u64) -> Result<Progress, CoordinatorError> {
        let cutoff = lease_cutoff(now_ms, self.lease_duration_ms);
        let store = self.store.clone();
        self.retry
            .run("progress", move || store.progress(cutoff))
            .await
    }
}
