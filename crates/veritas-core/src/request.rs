//! Detection requests and caller budgets

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::consensus::{InvocationMode, VotingStrategy};
use crate::error::ConsensusError;

/// Kind of non-text content attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

/// Reference to media produced alongside the text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub uri: String,
}

impl MediaAttachment {
    pub fn new(kind: MediaKind, uri: &str) -> Self {
        Self {
            kind,
            uri: uri.to_string(),
        }
    }
}

/// Caller-supplied cost and latency constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum total cost for one detection
    pub max_cost: Option<f64>,
    /// Maximum acceptable latency of any single judge (ms)
    pub max_latency_ms: Option<u64>,
    /// Minimum number of judges that should vote
    pub min_models: usize,
    /// End-to-end deadline for the whole detection (ms)
    pub deadline_ms: Option<u64>,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_cost: None,
            max_latency_ms: None,
            min_models: 2,
            deadline_ms: None,
        }
    }
}

impl Budget {
    /// No cost or latency ceilings, one voting judge is enough
    pub fn unlimited() -> Self {
        Self {
            min_models: 1,
            ..Default::default()
        }
    }

    pub fn with_max_cost(mut self, cost: f64) -> Self {
        self.max_cost = Some(cost);
        self
    }

    pub fn with_max_latency(mut self, latency: Duration) -> Self {
        self.max_latency_ms = Some(latency.as_millis() as u64);
        self
    }

    pub fn with_min_models(mut self, count: usize) -> Self {
        self.min_models = count;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub fn max_latency(&self) -> Option<Duration> {
        self.max_latency_ms.map(Duration::from_millis)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Whether a judge with this cost fits into what is left of the budget
    pub fn affords(&self, spent: f64, cost: f64) -> bool {
        match self.max_cost {
            Some(max) => spent + cost <= max + 1e-9,
            None => true,
        }
    }
}

/// A request to judge one piece of agent output. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRequest {
    id: Uuid,
    content: String,
    context: Option<String>,
    media: Vec<MediaAttachment>,
    budget: Budget,
    strategy: Option<VotingStrategy>,
    mode: Option<InvocationMode>,
}

impl DetectionRequest {
    /// Create a request for the given content with a default budget
    pub fn new(content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.to_string(),
            context: None,
            media: Vec::new(),
            budget: Budget::default(),
            strategy: None,
            mode: None,
        }
    }

    /// Attach ground truth or source context
    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media.push(media);
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    /// Force a voting strategy instead of the engine default
    pub fn with_strategy(mut self, strategy: VotingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Force an invocation mode instead of the strategy default
    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn media(&self) -> &[MediaAttachment] {
        &self.media
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    pub fn strategy(&self) -> Option<&VotingStrategy> {
        self.strategy.as_ref()
    }

    pub fn mode(&self) -> Option<InvocationMode> {
        self.mode
    }

    /// Reject malformed requests before any judge is called
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.content.trim().is_empty() {
            return Err(ConsensusError::InvalidRequest(
                "content must not be empty".to_string(),
            ));
        }
        if self.budget.min_models == 0 {
            return Err(ConsensusError::InvalidRequest(
                "min_models must be at least 1".to_string(),
            ));
        }
        if let Some(max_cost) = self.budget.max_cost {
            if max_cost.is_nan() || max_cost < 0.0 {
                return Err(ConsensusError::InvalidRequest(format!(
                    "max_cost must be non-negative, got {}",
                    max_cost
                )));
            }
        }
        if let Some(strategy) = &self.strategy {
            strategy.validate()?;
        }
        Ok(())
    }
}
