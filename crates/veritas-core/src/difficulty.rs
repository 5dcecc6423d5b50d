//! Difficulty estimates and buckets

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of how hard a request is to judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyBucket {
    Low,
    Medium,
    High,
}

impl DifficultyBucket {
    pub const ALL: [DifficultyBucket; 3] = [
        DifficultyBucket::Low,
        DifficultyBucket::Medium,
        DifficultyBucket::High,
    ];

    /// Bucket for a difficulty score in [0, 1]
    pub fn from_score(score: f64) -> Self {
        if score < 0.33 {
            DifficultyBucket::Low
        } else if score < 0.66 {
            DifficultyBucket::Medium
        } else {
            DifficultyBucket::High
        }
    }

    /// Position in [`DifficultyBucket::ALL`]
    pub fn index(&self) -> usize {
        match self {
            DifficultyBucket::Low => 0,
            DifficultyBucket::Medium => 1,
            DifficultyBucket::High => 2,
        }
    }
}

impl fmt::Display for DifficultyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyBucket::Low => f.write_str("low"),
            DifficultyBucket::Medium => f.write_str("medium"),
            DifficultyBucket::High => f.write_str("high"),
        }
    }
}

/// Individual heuristic signals, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DifficultySignals {
    pub length: f64,
    pub technical: f64,
    pub factual: f64,
    pub hedging: f64,
    pub multimodal: f64,
}

/// Difficulty estimate for one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Difficulty {
    /// Combined score in [0, 1]
    pub score: f64,
    pub bucket: DifficultyBucket,
    pub signals: DifficultySignals,
}

impl Difficulty {
    pub fn new(score: f64, signals: DifficultySignals) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self {
            score,
            bucket: DifficultyBucket::from_score(score),
            signals,
        }
    }

    /// Difficulty with no signal breakdown, mostly for tests
    pub fn from_score(score: f64) -> Self {
        Self::new(score, DifficultySignals::default())
    }
}
