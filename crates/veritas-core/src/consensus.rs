//! Voting strategies, invocation modes and the consensus result

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::difficulty::DifficultyBucket;
use crate::error::ConsensusError;
use crate::judge::JudgeResult;

/// Default cutoff for weighted voting
pub const DEFAULT_WEIGHTED_THRESHOLD: f64 = 0.5;

/// How successful judge results are combined into one verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum VotingStrategy {
    /// Binary votes, ties resolve toward "hallucination"
    Majority,
    /// Trust- and confidence-weighted mean score against a threshold
    Weighted { threshold: f64 },
    /// Flag only if every judge votes "hallucination"
    Unanimous,
    /// Flag if at least `fraction` of judges vote "hallucination"
    Threshold { fraction: f64 },
    /// Cost-ordered early-stopping invocation, resolved by weighted voting
    Cascading,
}

impl Default for VotingStrategy {
    fn default() -> Self {
        VotingStrategy::weighted()
    }
}

impl VotingStrategy {
    /// Weighted voting with the default 0.5 threshold
    pub fn weighted() -> Self {
        VotingStrategy::Weighted {
            threshold: DEFAULT_WEIGHTED_THRESHOLD,
        }
    }

    /// Short stable name used in logs, metrics and explanations
    pub fn name(&self) -> &'static str {
        match self {
            VotingStrategy::Majority => "majority",
            VotingStrategy::Weighted { .. } => "weighted",
            VotingStrategy::Unanimous => "unanimous",
            VotingStrategy::Threshold { .. } => "threshold",
            VotingStrategy::Cascading => "cascading",
        }
    }

    /// Invocation mode used when the caller does not force one
    pub fn default_mode(&self) -> InvocationMode {
        match self {
            VotingStrategy::Cascading => InvocationMode::Cascading,
            _ => InvocationMode::Parallel,
        }
    }

    pub fn validate(&self) -> Result<(), ConsensusError> {
        match self {
            VotingStrategy::Weighted { threshold } if !(0.0..=1.0).contains(threshold) => {
                Err(ConsensusError::InvalidRequest(format!(
                    "weighted threshold must be within [0, 1], got {}",
                    threshold
                )))
            }
            VotingStrategy::Threshold { fraction } if !(0.0..=1.0).contains(fraction) => {
                Err(ConsensusError::InvalidRequest(format!(
                    "threshold fraction must be within [0, 1], got {}",
                    fraction
                )))
            }
            _ => Ok(()),
        }
    }

    /// Parse a CLI/config name such as `weighted`, `threshold:0.6` or `weighted:0.7`
    pub fn parse(value: &str) -> Result<Self, ConsensusError> {
        let (name, arg) = match value.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (value, None),
        };
        let parse_arg = |default: f64| -> Result<f64, ConsensusError> {
            match arg {
                Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
                    ConsensusError::InvalidRequest(format!("invalid strategy argument: {}", raw))
                }),
                None => Ok(default),
            }
        };
        let strategy = match name.trim().to_lowercase().as_str() {
            "majority" => VotingStrategy::Majority,
            "weighted" => VotingStrategy::Weighted {
                threshold: parse_arg(DEFAULT_WEIGHTED_THRESHOLD)?,
            },
            "unanimous" => VotingStrategy::Unanimous,
            "threshold" => VotingStrategy::Threshold {
                fraction: parse_arg(0.6)?,
            },
            "cascading" | "cascade" => VotingStrategy::Cascading,
            other => {
                return Err(ConsensusError::InvalidRequest(format!(
                    "unknown voting strategy: {}",
                    other
                )))
            }
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

impl fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VotingStrategy::Weighted { threshold } => write!(f, "weighted(>{:.2})", threshold),
            VotingStrategy::Threshold { fraction } => write!(f, "threshold(>={:.2})", fraction),
            other => f.write_str(other.name()),
        }
    }
}

/// How the selected judges are invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// All judges at once, each with its own timeout
    #[default]
    Parallel,
    /// Ascending cost order, stop once confident enough
    Cascading,
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationMode::Parallel => f.write_str("parallel"),
            InvocationMode::Cascading => f.write_str("cascading"),
        }
    }
}

/// The final, explainable decision for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Request this verdict answers
    pub request_id: Uuid,
    /// Aggregated hallucination score; `None` when no judge voted
    pub aggregated_score: Option<f64>,
    /// True when the content is flagged as a hallucination
    pub verdict: bool,
    /// models_agreed / models_voted, always within [0, 1]
    pub agreement_ratio: f64,
    /// Judges whose binary vote matches the verdict
    pub models_agreed: usize,
    /// Judges that returned a usable vote
    pub models_voted: usize,
    /// Every judge invoked for this request, including failures
    pub judge_results: Vec<JudgeResult>,
    /// Sum of the costs of `judge_results`
    pub total_cost: f64,
    /// Wall-clock time spent in the consensus run (ms)
    pub total_latency_ms: u64,
    /// Strategy that produced the verdict
    pub strategy: VotingStrategy,
    /// How the judges were invoked
    pub mode: InvocationMode,
    /// Difficulty estimate for the request
    pub difficulty: f64,
    /// Difficulty bucket used for selection and stats
    pub difficulty_bucket: DifficultyBucket,
    /// Fewer judges voted than the caller asked for; escalate if it matters
    pub low_confidence: bool,
    /// The budget could not afford the minimum judge count
    pub budget_constrained: bool,
    /// Served from the semantic cache without invoking any judge
    pub from_cache: bool,
    /// Cascading mode skipped judges because confidence was already high
    pub cascade_stopped_early: bool,
    /// Non-fatal problems absorbed while producing this result
    pub degradations: Vec<ConsensusError>,
    /// Human-readable account of how the verdict was reached
    pub explanation: String,
}

impl ConsensusResult {
    /// Judge results that produced a vote
    pub fn successful_results(&self) -> impl Iterator<Item = &JudgeResult> {
        self.judge_results.iter().filter(|r| r.is_success())
    }

    /// Sum of the costs of the judges actually invoked
    pub fn invoked_cost(&self) -> f64 {
        self.judge_results.iter().map(|r| r.cost).sum()
    }

    /// Copy of this result as served from the cache for another request:
    /// no judge is invoked, so no judge result or cost is carried over.
    pub fn as_cache_hit(&self, request_id: Uuid, similarity: f32) -> Self {
        let mut hit = self.clone();
        hit.request_id = request_id;
        hit.from_cache = true;
        hit.judge_results = Vec::new();
        hit.total_cost = 0.0;
        hit.total_latency_ms = 0;
        hit.degradations = Vec::new();
        hit.explanation = format!(
            "Served from semantic cache (similarity {:.3}). {}",
            similarity, self.explanation
        );
        hit
    }
}
