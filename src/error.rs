//! Error Taxonomy
//!
//! Two layers of errors flow through the coordinator:
//! - **`StoreError`**: what a `UnitStore` backend reports. `Busy` is transient and
//!   retried by the `RetryPolicy`; everything else is final.
//! - **`CoordinatorError`**: the outcome surfaced to callers of `claim_next` and
//!   `submit_result`. Validation variants never mutate state.

use crate::registry::types::UnitId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Lock contention or a busy backend. Safe to retry.
    #[error("store busy: {0}")]
    Busy(String),
    /// A uniqueness constraint was hit by a row that differs from the stored one.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// The unit being created breaks a structural rule (empty range, base 0, ...).
    #[error("invalid unit: {0}")]
    InvalidUnit(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Busy(err.to_string())
            }
            Some(ErrorCode::ConstraintViolation) => StoreError::UniqueViolation(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Outcome of a failed `claim_next` / `submit_result` call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Missing one or more required fields.")]
    MissingFields,
    #[error("Search field {0} does not exist.")]
    NotFound(UnitId),
    #[error("This field has already been completed.")]
    AlreadyCompleted,
    #[error("This field wasn't claimed.")]
    NotClaimed,
    #[error("Missing one or more digits in unique_count.")]
    MissingDigits,
    #[error("unique_count contains digits outside 1..={base}.")]
    UnexpectedDigits { base: u32 },
    #[error("Missing one or more counts in unique_count (expected {expected}).")]
    CountMismatch { expected: u64 },
    /// A derived row collides with a different row already stored.
    #[error("Submission conflicts with stored results: {0}")]
    Conflict(String),
    #[error("No field is currently available to claim.")]
    NoEligibleUnit,
    #[error("Store unavailable during {operation}: {reason}")]
    Unavailable { operation: String, reason: String },
}

impl CoordinatorError {
    /// Caller-input problems: reported immediately, never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoordinatorError::MissingFields
                | CoordinatorError::NotFound(_)
                | CoordinatorError::AlreadyCompleted
                | CoordinatorError::NotClaimed
                | CoordinatorError::MissingDigits
                | CoordinatorError::UnexpectedDigits { .. }
                | CoordinatorError::CountMismatch { .. }
        )
    }

    /// Whether a caller may retry the whole operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordinatorError::Unavailable { .. } | CoordinatorError::NoEligibleUnit
        )
    }

    pub(crate) fn unavailable(operation: &str, err: &StoreError) -> Self {
        CoordinatorError::Unavailable {
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> CoordinatorError {
        CoordinatorError::unavailable("mark_completed", &StoreError::Busy("locked".to_string()))
    }

    #[test]
    fn test_error_classification() {
        let validation = [
            CoordinatorError::MissingFields,
            CoordinatorError::NotFound(UnitId(3)),
            CoordinatorError::AlreadyCompleted,
            CoordinatorError::NotClaimed,
            CoordinatorError::MissingDigits,
            CoordinatorError::UnexpectedDigits { base: 10 },
            CoordinatorError::CountMismatch { expected: 100 },
        ];
        for error in &validation {
            assert!(error.is_validation(), "{:?}", error);
            assert!(!error.is_retryable(), "{:?}", error);
        }

        for error in [CoordinatorError::NoEligibleUnit, unavailable()] {
            assert!(error.is_retryable(), "{:?}", error);
            assert!(!error.is_validation(), "{:?}", error);
        }

        // Resubmitting the same conflicting rows fails the same way
        let conflict = CoordinatorError::Conflict("near miss 5".to_string());
        assert!(!conflict.is_validation());
        assert!(!conflict.is_retryable());
    }

    #[test]
    fn test_unavailable_keeps_operation_and_cause() {
        assert_eq!(
            unavailable().to_string(),
            "Store unavailable during mark_completed: store busy: locked"
        );
    }
}
