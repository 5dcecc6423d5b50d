//! Error and degradation taxonomy
//!
//! Only [`ConsensusError::NoAvailableJudges`] and
//! [`ConsensusError::InvalidRequest`] are ever returned as hard failures.
//! Every other variant is absorbed into a [`crate::ConsensusResult`] and
//! listed in its `degradations`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::judge::JudgeId;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum ConsensusError {
    #[error("No enabled judges are registered")]
    NoAvailableJudges,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Budget affords {affordable} judge(s), {required} required")]
    BudgetInsufficient { affordable: usize, required: usize },

    #[error("Judge {judge} timed out after {timeout_ms}ms")]
    AdapterTimeout { judge: JudgeId, timeout_ms: u64 },

    #[error("Judge {judge} failed: {message}")]
    AdapterError { judge: JudgeId, message: String },

    #[error("Low confidence result: {voted} judge(s) voted, {required} required")]
    LowConfidenceResult { voted: usize, required: usize },

    #[error("Deadline of {deadline_ms}ms reached before all judges answered")]
    DeadlineExceeded { deadline_ms: u64 },

    #[error("Request cancelled by caller")]
    Cancelled,

    #[error("Semantic cache unavailable: {reason}")]
    CacheUnavailable { reason: String },
}

impl ConsensusError {
    /// Whether this error must be surfaced to the caller instead of absorbed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsensusError::NoAvailableJudges | ConsensusError::InvalidRequest(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(ConsensusError::NoAvailableJudges.is_fatal());
        assert!(ConsensusError::InvalidRequest("x".into()).is_fatal());
        assert!(!ConsensusError::Cancelled.is_fatal());
        assert!(!ConsensusError::CacheUnavailable {
            reason: "down".into()
        }
        .is_fatal());
        assert!(!ConsensusError::AdapterTimeout {
            judge: JudgeId::new("a"),
            timeout_ms: 10
        }
        .is_fatal());
    }

    #[test]
    fn test_display() {
        let err = ConsensusError::BudgetInsufficient {
            affordable: 1,
            required: 2,
        };
        assert_eq!(err.to_string(), "Budget affords 1 judge(s), 2 required");
    }
}
