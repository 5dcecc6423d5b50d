//! # Veritas Core
//!
//! Core types shared by every Veritas crate:
//! - [`DetectionRequest`] - Immutable input to the consensus pipeline
//! - [`JudgeProfile`] / [`JudgeResult`] - Static judge metadata and per-call outcomes
//! - [`ConsensusResult`] - The final, explainable verdict
//! - [`PerformanceStat`] - Rolling per-judge statistics used for adaptive selection
//! - [`ConsensusError`] - Error and degradation taxonomy

pub mod cancel;
pub mod consensus;
pub mod difficulty;
pub mod error;
pub mod judge;
pub mod request;
pub mod stats;

pub use cancel::CancellationToken;
pub use consensus::{ConsensusResult, InvocationMode, VotingStrategy, DEFAULT_WEIGHTED_THRESHOLD};
pub use difficulty::{Difficulty, DifficultyBucket, DifficultySignals};
pub use error::ConsensusError;
pub use judge::{JudgeFailure, JudgeId, JudgeProfile, JudgeResult, LatencyClass};
pub use request::{Budget, DetectionRequest, MediaAttachment, MediaKind};
pub use stats::{BucketStat, PerformanceStat};
