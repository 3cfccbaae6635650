//! Lease Allocator
//!
//! Implements `claim_next`: pick an eligible unit under the `SelectionPolicy`, then
//! lease it with a single conditional store update. Selection and leasing are two
//! separate store calls; the conditional update is what prevents two requesters
//! from both walking away with the same unit. A requester that loses the race
//! simply selects again.

use super::policy::{Selection, SelectionPolicy};
use crate::error::CoordinatorError;
use crate::registry::store::UnitStore;
use crate::registry::types::*;
use crate::retry::RetryPolicy;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct LeaseAllocator {
    store: Arc<dyn UnitStore>,
    policy: SelectionPolicy,
    retry: RetryPolicy,
    lease_duration: Duration,
    rng: Mutex<StdRng>,
}

impl LeaseAllocator {
    pub fn new(
        store: Arc<dyn UnitStore>,
        policy: SelectionPolicy,
        retry: RetryPolicy,
        lease_duration: Duration,
    ) -> Self {
        Self::with_rng(store, policy, retry, lease_duration, StdRng::from_entropy())
    }

    /// Same as `new` with a caller-provided RNG (deterministic selection in tests).
    pub fn with_rng(
        store: Arc<dyn UnitStore>,
        policy: SelectionPolicy,
        retry: RetryPolicy,
        lease_duration: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            policy,
            retry,
            lease_duration,
            rng: Mutex::new(rng),
        }
    }

    pub fn lease_duration_ms(&self) -> u64 {
        self.lease_duration.as_millis() as u64
    }

    /// Leases the next unit to `requester` at the current time.
    pub async fn claim_next(&self, requester: &str) -> Result<LeaseView, CoordinatorError> {
        self.claim_next_at(requester, now_ms()).await
    }

    /// Leases the next unit to `requester` as of `now_ms`.
    ///
    /// Returns `NoEligibleUnit` when nothing is claimable, or when every attempt lost
    /// its race against another requester.
    pub async fn claim_next_at(
        &self,
        requester: &str,
        now_ms: u64,
    ) -> Result<LeaseView, CoordinatorError> {
        let holder = if requester.trim().is_empty() {
            ANONYMOUS
        } else {
            requester
        };
        let lease_ms = self.lease_duration_ms();
        let cutoff = lease_cutoff(now_ms, lease_ms);
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 0..attempts {
            let Some(unit_id) = self.select_candidate(cutoff).await? else {
                tracing::debug!(requester = holder, "No eligible unit to claim");
                return Err(CoordinatorError::NoEligibleUnit);
            };

            let store = self.store.clone();
            let lease_holder = holder.to_string();
            let leased = self
                .retry
                .run("lease_unit", move || {
                    store.try_lease(unit_id, &lease_holder, now_ms, cutoff)
                })
                .await?;

            match leased {
                Some(unit) => {
                    let view = LeaseView::from_unit(&unit, lease_ms).ok_or_else(|| {
                        CoordinatorError::Unavailable {
                            operation: "lease_unit".to_string(),
                            reason: format!("unit {} returned without a lease", unit_id),
                        }
                    })?;
                    tracing::info!(
                        unit_id = %unit_id,
                        requester = holder,
                        attempt,
                        "Leased [{}, {}) until {}",
                        view.range_start,
                        view.range_end,
                        view.expiration_time
                    );
                    return Ok(view);
                }
                None => {
                    tracing::debug!(
                        unit_id = %unit_id,
                        requester = holder,
                        attempt,
                        "Unit claimed by another requester, selecting again"
                    );
                }
            }
        }

        tracing::warn!(
            requester = holder,
            attempts,
            "Lost every claim race, reporting no eligible unit"
        );
        Err(CoordinatorError::NoEligibleUnit)
    }

    fn roll(&self) -> Selection {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.policy.choose(&mut *rng)
    }

    /// Picks the unit to attempt, without leasing it.
    pub(crate) async fn select_candidate(
        &self,
        cutoff_ms: u64,
    ) -> Result<Option<UnitId>, CoordinatorError> {
        let selection = self.roll();
        let store = self.store.clone();
        self.retry
            .run("select_unit", move || match selection {
                Selection::Earliest => store.earliest_eligible(cutoff_ms),
                Selection::Random(pick) => store.pick_eligible(cutoff_ms, pick),
            })
            .await
    }
}
