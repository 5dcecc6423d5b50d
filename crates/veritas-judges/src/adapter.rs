//! Judge adapter trait and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use veritas_core::{DetectionRequest, MediaAttachment};

/// Errors from judge adapters
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Timed out after {0}ms")]
    Timeout(u64),
    #[error("Circuit open")]
    CircuitOpen,
    #[error("Judge not available")]
    NotAvailable,
}

/// What a judge sees of a detection request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeInput {
    pub request_id: Uuid,
    /// Agent output to judge
    pub content: String,
    /// Optional ground truth / source material
    pub context: Option<String>,
    pub media: Vec<MediaAttachment>,
}

impl JudgeInput {
    pub fn text(content: &str) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            content: content.to_string(),
            context: None,
            media: Vec::new(),
        }
    }
}

impl From<&DetectionRequest> for JudgeInput {
    fn from(request: &DetectionRequest) -> Self {
        Self {
            request_id: request.id(),
            content: request.content().to_string(),
            context: request.context().map(str::to_string),
            media: request.media().to_vec(),
        }
    }
}

/// Raw output of one judge call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Hallucination score (0.0 - 1.0)
    pub score: f64,
    /// Confidence in the score (0.0 - 1.0)
    pub confidence: f64,
    /// Cost charged for the call
    pub cost: f64,
    /// Time taken in milliseconds
    pub latency_ms: u64,
}

/// Capability interface implemented by every judge backend
#[async_trait]
pub trait JudgeAdapter: Send + Sync + std::fmt::Debug {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Check if the judge can currently take calls
    async fn is_available(&self) -> bool {
        true
    }

    /// Score one input. `timeout` is a hint; the orchestrator enforces it.
    async fn invoke(&self, input: &JudgeInput, timeout: Duration) -> Result<JudgeVerdict, JudgeError>;

    /// Score plain text (convenience method)
    async fn judge_text(&self, content: &str) -> Result<JudgeVerdict, JudgeError> {
        self.invoke(&JudgeInput::text(content), Duration::from_secs(30))
            .await
    }
}
