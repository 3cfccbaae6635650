//! Submission Validator
//!
//! Ordered, side-effect free checks over the incoming submission and the current
//! state of the unit it references. The first failing check decides the outcome.
//!
//! The submitter's identity is deliberately not compared with the lease holder:
//! any caller may finish a unit that is leased and not yet completed.

use super::types::Submission;
use crate::error::CoordinatorError;
use crate::registry::types::WorkUnit;

use std::sync::Arc;

/// Cross-check between the reported near misses and the digit-count distribution.
pub trait NearMissCheck: Send + Sync {
    fn check(&self, unit: &WorkUnit, submission: &Submission) -> Result<(), CoordinatorError>;
}

/// Accepts every submission.
pub struct AcceptAllNearMisses;

impl NearMissCheck for AcceptAllNearMisses {
    fn check(&self, _unit: &WorkUnit, _submission: &Submission) -> Result<(), CoordinatorError> {
        Ok(())
    }
}

pub struct SubmissionValidator {
    near_miss_check: Arc<dyn NearMissCheck>,
}

impl SubmissionValidator {
    pub fn new() -> Self {
        Self::with_near_miss_check(Arc::new(AcceptAllNearMisses))
    }

    pub fn with_near_miss_check(near_miss_check: Arc<dyn NearMissCheck>) -> Self {
        Self { near_miss_check }
    }

    /// Runs every check in order. `unit` is the registry's current view of the unit
    /// named by `submission.unit_id` (`None` if it does not exist).
    pub fn validate<'a>(
        &self,
        unit: Option<&'a WorkUnit>,
        submission: &Submission,
    ) -> Result<&'a WorkUnit, CoordinatorError> {
        // 1. Required fields
        let Some(unit_id) = submission.unit_id else {
            return Err(CoordinatorError::MissingFields);
        };
        if submission.digit_counts.is_empty() {
            return Err(CoordinatorError::MissingFields);
        }

        // 2. Existence
        let unit = match unit {
            Some(unit) if unit.id == unit_id => unit,
            _ => return Err(CoordinatorError::NotFound(unit_id)),
        };

        // 3. Not completed
        if unit.completed_by.is_some() {
            return Err(CoordinatorError::AlreadyCompleted);
        }

        // 4. Leased (by anyone)
        if unit.lease_holder.is_none() {
            return Err(CoordinatorError::NotClaimed);
        }

        // 5. Every digit 1..=base present, nothing else
        if !(1..=unit.base).all(|digit| submission.digit_counts.contains_key(&digit)) {
            return Err(CoordinatorError::MissingDigits);
        }
        if submission
            .digit_counts
            .keys()
            .any(|&digit| digit == 0 || digit > unit.base)
        {
            return Err(CoordinatorError::UnexpectedDigits { base: unit.base });
        }

        // 6. Counts cover the whole range
        let total = submission
            .digit_counts
            .values()
            .try_fold(0u64, |acc, &count| acc.checked_add(count));
        if total != Some(unit.range_size) {
            return Err(CoordinatorError::CountMismatch {
                expected: unit.range_size,
            });
        }

        // 7. Near misses consistent with the counts
        self.near_miss_check.check(unit, submission)?;

        Ok(unit)
    }
}

impl Default for SubmissionValidator {
    fn default() -> Self {
        Self::new()
    }
}
