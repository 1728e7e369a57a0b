use thiserror::Error;

/// Errors raised by the exploration core.
///
/// Transport failures live with the query boundary in the coordinator crate;
/// everything here is about malformed input or a violated precondition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExplorerError {
    #[error("matrix must be non-empty and square")]
    NotSquare,

    #[error("invalid door {0:?}: doors are the digits 0-5")]
    InvalidDoor(String),

    #[error("plan of {len} doors exceeds the per-query cap of {cap}")]
    PlanTooLong { len: usize, cap: usize },

    #[error("plans need {requested} doors but only {remaining} remain in the budget")]
    BudgetExceeded { requested: usize, remaining: usize },

    #[error("plan {plan:?} returned {got} labels, expected {expected}")]
    MalformedResult {
        plan: String,
        expected: usize,
        got: usize,
    },

    #[error("plan {plan:?} returned label {label}, labels are 0-3")]
    UnknownLabel { plan: String, label: i64 },

    #[error("plan {plan:?} started in a room labelled {got}, the start room is labelled {expected}")]
    StartMismatch { plan: String, expected: u8, got: u8 },
}

impl ExplorerError {
    /// Result-shape problems are discarded by the coordinator rather than retried.
    pub fn is_malformed_result(&self) -> bool {
        matches!(
            self,
            ExplorerError::MalformedResult { .. }
                | ExplorerError::UnknownLabel { .. }
                | ExplorerError::StartMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;
