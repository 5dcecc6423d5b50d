//! Scripted judge for tests and demos

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::adapter::{JudgeAdapter, JudgeError, JudgeInput, JudgeVerdict};

/// What a [`MockJudge`] answers
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always the same score and confidence
    Fixed { score: f64, confidence: f64 },
    /// Cycles through (score, confidence) pairs
    Sequence(Vec<(f64, f64)>),
    /// Always fails with this message
    Fail(String),
    /// Never answers
    Hang,
    /// Scores the content with simple overclaim heuristics
    Heuristic { sensitivity: f64, confidence: f64 },
}

/// A judge that returns predefined verdicts
#[derive(Debug)]
pub struct MockJudge {
    name: String,
    behavior: MockBehavior,
    /// Simulated latency
    latency: Duration,
    /// Cost charged per successful call
    cost: f64,
    calls: AtomicUsize,
    index: AtomicUsize,
}

impl MockJudge {
    pub fn new(name: &str, behavior: MockBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            latency: Duration::from_millis(10),
            cost: 0.0,
            calls: AtomicUsize::new(0),
            index: AtomicUsize::new(0),
        }
    }

    pub fn fixed(name: &str, score: f64, confidence: f64) -> Self {
        Self::new(name, MockBehavior::Fixed { score, confidence })
    }

    pub fn sequence(name: &str, answers: Vec<(f64, f64)>) -> Self {
        Self::new(name, MockBehavior::Sequence(answers))
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self::new(name, MockBehavior::Fail(message.to_string()))
    }

    pub fn hanging(name: &str) -> Self {
        Self::new(name, MockBehavior::Hang)
    }

    pub fn heuristic(name: &str, sensitivity: f64, confidence: f64) -> Self {
        Self::new(
            name,
            MockBehavior::Heuristic {
                sensitivity,
                confidence,
            },
        )
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Number of times `invoke` was entered
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JudgeAdapter for MockJudge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: &JudgeInput, _timeout: Duration) -> Result<JudgeVerdict, JudgeError> {
        let start = Instant::now();
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        let (score, confidence) = match &self.behavior {
            MockBehavior::Fixed { score, confidence } => (*score, *confidence),
            MockBehavior::Sequence(answers) => {
                if answers.is_empty() {
                    return Err(JudgeError::InvalidResponse("empty script".to_string()));
                }
                let idx = self.index.fetch_add(1, Ordering::SeqCst) % answers.len();
                answers[idx]
            }
            MockBehavior::Fail(message) => return Err(JudgeError::RequestFailed(message.clone())),
            MockBehavior::Hang => std::future::pending::<(f64, f64)>().await,
            MockBehavior::Heuristic {
                sensitivity,
                confidence,
            } => (overclaim_score(input) * sensitivity, *confidence),
        };

        Ok(JudgeVerdict {
            score,
            confidence,
            cost: self.cost,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Crude likelihood that the content overclaims, in [0, 1]
fn overclaim_score(input: &JudgeInput) -> f64 {
    let lower = input.content.to_lowercase();
    let mut score: f64 = 0.1;

    // Universal quantifiers
    if ["always", "never", "all ", "none ", "every ", "no one"]
        .iter()
        .any(|w| lower.contains(w))
    {
        score += 0.2;
    }
    // Unsourced statistics
    if ["%", "percent", "statistics", "data shows"]
        .iter()
        .any(|w| lower.contains(w))
    {
        score += 0.15;
    }
    // Causal leaps
    if ["therefore", "causes", "leads to", "results in"]
        .iter()
        .any(|w| lower.contains(w))
    {
        score += 0.1;
    }

    // Proper nouns and numbers absent from the supplied context
    if let Some(context) = &input.context {
        let context_lower = context.to_lowercase();
        let claims: Vec<&str> = input
            .content
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| {
                w.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
            })
            .collect();
        if !claims.is_empty() {
            let missing = claims
                .iter()
                .filter(|w| !context_lower.contains(&w.to_lowercase()))
                .count();
            score += 0.6 * missing as f64 / claims.len() as f64;
        }
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_mock() {
        let judge = MockJudge::fixed("j", 0.9, 0.8).with_cost(0.01);
        let verdict = judge.judge_text("anything").await.unwrap();
        assert_eq!(verdict.score, 0.9);
        assert_eq!(verdict.confidence, 0.8);
        assert_eq!(verdict.cost, 0.01);
        assert_eq!(judge.calls(), 1);
    }

    #[tokio::test]
    async fn test_sequence_cycles() {
        let judge = MockJudge::sequence("j", vec![(0.1, 0.5), (0.9, 0.6)]);
        assert_eq!(judge.judge_text("a").await.unwrap().score, 0.1);
        assert_eq!(judge.judge_text("a").await.unwrap().score, 0.9);
        assert_eq!(judge.judge_text("a").await.unwrap().score, 0.1);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let judge = MockJudge::failing("j", "boom");
        assert!(matches!(
            judge.judge_text("a").await,
            Err(JudgeError::RequestFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_mock_never_answers() {
        let judge = MockJudge::hanging("j");
        let outcome =
            tokio::time::timeout(Duration::from_secs(5), judge.judge_text("a")).await;
        assert!(outcome.is_err());
        assert_eq!(judge.calls(), 1);
    }

    #[tokio::test]
    async fn test_heuristic_flags_context_mismatch() {
        let judge = MockJudge::heuristic("j", 1.0, 0.8);
        let mut input = JudgeInput::text("The Eiffel Tower is in London");
        input.context = Some("The Eiffel Tower is in Paris, France.".to_string());
        let wrong = judge.invoke(&input, Duration::from_secs(1)).await.unwrap();

        input.content = "The Eiffel Tower is in Paris".to_string();
        let right = judge.invoke(&input, Duration::from_secs(1)).await.unwrap();
        assert!(wrong.score > right.score);
    }
}
