//! Workflow error taxonomy.
//!
//! Errors split along one line: anything that keeps the user from seeing
//! their transformation result is a [`WorkflowError`]; anything that only
//! affects bookkeeping (usage history, archived copies) degrades into a
//! [`WorkflowWarning`] carried alongside a successful outcome.

use thiserror::Error;

use imgx_ledger::LedgerError;
use imgx_models::RequestValidationError;
use imgx_provider::{PollError, ProviderError};

/// Fatal workflow errors, surfaced to the caller.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid request: {0}")]
    Validation(#[from] RequestValidationError),

    #[error("Insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: u32, available: u32 },

    #[error("Ledger error: {0}")]
    Ledger(#[source] LedgerError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Poll(#[from] PollError),
}

impl WorkflowError {
    /// Map a ledger failure from the reservation path, where a short
    /// balance is a first-class outcome rather than an internal error.
    pub(crate) fn from_reservation(error: LedgerError, required: u32) -> Self {
        match error {
            LedgerError::InsufficientCredits { available } => {
                Self::InsufficientCredits { required, available }
            }
            other => Self::Ledger(other),
        }
    }
}

/// Non-fatal outcomes of best-effort bookkeeping steps.
///
/// Each warning is logged when it happens and returned with the outcome,
/// so callers can see that bookkeeping degraded without the workflow
/// pretending the error never occurred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowWarning {
    #[error("usage record was not created: {0}")]
    UsageCreate(String),

    #[error("usage record was not amended: {0}")]
    UsageAmend(String),

    #[error("input image was not archived: {0}")]
    InputPersist(String),

    #[error("output image was not archived: {0}")]
    OutputPersist(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_mapping_special_cases_short_balance() {
        let err = WorkflowError::from_reservation(
            LedgerError::InsufficientCredits { available: 2 },
            10,
        );
        match err {
            WorkflowError::InsufficientCredits { required, available } => {
                assert_eq!(required, 10);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientCredits, got {other:?}"),
        }

        let err = WorkflowError::from_reservation(LedgerError::not_found("profiles"), 10);
        assert!(matches!(err, WorkflowError::Ledger(_)));
    }
}
