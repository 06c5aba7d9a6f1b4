//! Plan error types

use thiserror::Error;

/// Why a move was refused; the document is left unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveRejection {
    #[error("plan has no days")]
    EmptyDocument,

    #[error("target day already contains this activity")]
    DuplicateInTargetDay,

    #[error("target day is full")]
    TargetDayFull,
}

/// Errors from plan reconciliation
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Final document is not valid JSON: {0}")]
    InvalidFinal(#[from] serde_json::Error),

    #[error("Final document failed validation: {0}")]
    Schema(String),

    #[error("Plan already finalized for turn {0}")]
    AlreadyFinalized(u64),

    #[error("No item at day {day}, index {index}")]
    NoSuchItem { day: usize, index: usize },

    #[error("Item '{key}' is no longer in the plan")]
    StaleTarget { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = PlanError::NoSuchItem { day: 1, index: 4 };
        assert_eq!(err.to_string(), "No item at day 1, index 4");

        let err = PlanError::StaleTarget {
            key: "balboa park".to_string(),
        };
        assert_eq!(err.to_string(), "Item 'balboa park' is no longer in the plan");

        assert_eq!(MoveRejection::DuplicateInTargetDay.to_string(), "target day already contains this activity");
    }
}
