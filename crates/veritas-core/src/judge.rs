//! Judge profiles and per-call results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Stable identifier for a registered judge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JudgeId(String);

impl JudgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JudgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JudgeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JudgeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Declared latency class of a judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    /// Local or statistical judges (~300ms)
    Fast,
    /// Hosted small models (~1.5s)
    #[default]
    Standard,
    /// Large or multimodal models (~5s)
    Slow,
}

impl LatencyClass {
    /// Nominal latency used for budget planning
    pub fn nominal(&self) -> Duration {
        match self {
            LatencyClass::Fast => Duration::from_millis(300),
            LatencyClass::Standard => Duration::from_millis(1500),
            LatencyClass::Slow => Duration::from_millis(5000),
        }
    }
}

/// Static metadata for one judge. Owned by the registry, read-only elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeProfile {
    /// Stable registry key
    pub id: JudgeId,
    /// Display name
    pub name: String,
    /// Relative trust weight used by weighted voting (> 0)
    pub trust_weight: f64,
    /// Estimated cost of one call
    pub cost_estimate: f64,
    /// Declared latency class
    pub latency_class: LatencyClass,
    /// Disabled judges are never selected
    pub enabled: bool,
}

impl JudgeProfile {
    /// Create an enabled profile with weight 1.0 and zero cost
    pub fn new(id: impl Into<JudgeId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            trust_weight: 1.0,
            cost_estimate: 0.0,
            latency_class: LatencyClass::default(),
            enabled: true,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.trust_weight = weight;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_estimate = cost;
        self
    }

    pub fn with_latency_class(mut self, class: LatencyClass) -> Self {
        self.latency_class = class;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Why a judge call produced no vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum JudgeFailure {
    /// Per-call timeout or end-to-end deadline fired
    Timeout,
    /// The adapter returned an error
    Error(String),
    /// The caller cancelled the request while the call was in flight
    Cancelled,
}

impl fmt::Display for JudgeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JudgeFailure::Timeout => f.write_str("timeout"),
            JudgeFailure::Error(msg) => write!(f, "error: {}", msg),
            JudgeFailure::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// One judge's output for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeResult {
    /// Judge that produced this result
    pub judge_id: JudgeId,
    /// Hallucination score (0.0 - 1.0)
    pub score: f64,
    /// Judge's confidence in the score (0.0 - 1.0)
    pub confidence: f64,
    /// Observed latency in milliseconds
    pub latency_ms: u64,
    /// Cost charged for this call
    pub cost: f64,
    /// Set when the call produced no usable vote
    pub error: Option<JudgeFailure>,
}

impl JudgeResult {
    /// A successful call. Score and confidence are clamped to [0, 1].
    pub fn success(judge_id: JudgeId, score: f64, confidence: f64, latency_ms: u64, cost: f64) -> Self {
        Self {
            judge_id,
            score: clamp_unit(score),
            confidence: clamp_unit(confidence),
            latency_ms,
            cost: cost.max(0.0),
            error: None,
        }
    }

    /// A call that failed, timed out or was cancelled
    pub fn failed(judge_id: JudgeId, failure: JudgeFailure, latency_ms: u64) -> Self {
        Self {
            judge_id,
            score: 0.0,
            confidence: 0.0,
            latency_ms,
            cost: 0.0,
            error: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Binary vote: true means "hallucination"
    pub fn vote(&self) -> bool {
        self.score > 0.5
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
