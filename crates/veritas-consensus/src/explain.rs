//! Human-readable explanations for consensus results

use std::fmt::Write;

use veritas_core::{ConsensusError, ConsensusResult, JudgeId, VotingStrategy};

/// Run details that are not part of the result itself
#[derive(Debug, Clone, Default)]
pub struct RunNotes {
    /// Judge added by exploration rather than ranking
    pub explored: Option<JudgeId>,
    /// Reserve judges invoked after a shortfall
    pub retried: usize,
    /// Judges skipped by an early cascade stop
    pub skipped: usize,
}

/// Describe why `result` reached its verdict
pub fn explain(result: &ConsensusResult, notes: &RunNotes) -> String {
    let mut out = String::new();

    match result.aggregated_score {
        Some(score) => {
            let _ = write!(
                out,
                "{} by {} voting (score {:.2}{}): {} of {} judge(s) agreed",
                if result.verdict {
                    "Flagged as hallucination"
                } else {
                    "Not flagged"
                },
                result.strategy.name(),
                score,
                strategy_detail(&result.strategy),
                result.models_agreed,
                result.models_voted,
            );
            let votes: Vec<String> = result
                .successful_results()
                .map(|r| format!("{} {:.2}@{:.2}", r.judge_id, r.score, r.confidence))
                .collect();
            if !votes.is_empty() {
                let _ = write!(out, " [{}]", votes.join(", "));
            }
            out.push('.');
        }
        None => out.push_str("No judge returned a usable verdict; not flagged by default."),
    }

    let _ = write!(
        out,
        " {} invocation of {} judge(s), difficulty {} ({:.2}).",
        capitalize(&result.mode.to_string()),
        result.judge_results.len(),
        result.difficulty_bucket,
        result.difficulty,
    );

    if let Some(judge) = &notes.explored {
        let _ = write!(out, " Explored {}.", judge);
    }
    if result.cascade_stopped_early {
        let _ = write!(
            out,
            " Cascade stopped early, skipping {} judge(s).",
            notes.skipped
        );
    }
    if notes.retried > 0 {
        let _ = write!(out, " Retried with {} reserve judge(s).", notes.retried);
    }
    if result.budget_constrained {
        out.push_str(" Budget constrained: fewer judges than requested were affordable.");
    }

    let failures: Vec<String> = result
        .judge_results
        .iter()
        .filter_map(|r| r.error.as_ref().map(|e| format!("{} ({})", r.judge_id, e)))
        .collect();
    if !failures.is_empty() {
        let _ = write!(out, " Failed: {}.", failures.join(", "));
    }
    for degradation in &result.degradations {
        match degradation {
            ConsensusError::DeadlineExceeded { .. } | ConsensusError::Cancelled => {
                let _ = write!(out, " {}.", degradation);
            }
            _ => {}
        }
    }
    if result.low_confidence {
        out.push_str(" Low confidence: escalate if the decision matters.");
    }

    out
}

fn strategy_detail(strategy: &VotingStrategy) -> String {
    match strategy {
        VotingStrategy::Weighted { threshold } => format!(", threshold {:.2}", threshold),
        VotingStrategy::Threshold { fraction } => format!(", required fraction {:.2}", fraction),
        _ => String::new(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use veritas_core::{DifficultyBucket, InvocationMode, JudgeFailure, JudgeResult};

    fn result() -> ConsensusResult {
        ConsensusResult {
            request_id: Uuid::new_v4(),
            aggregated_score: Some(0.9),
            verdict: true,
            agreement_ratio: 1.0,
            models_agreed: 1,
            models_voted: 1,
            judge_results: vec![
                JudgeResult::success("llm".into(), 0.9, 0.8, 12, 0.01),
                JudgeResult::failed("slow".into(), JudgeFailure::Timeout, 1000),
            ],
            total_cost: 0.01,
            total_latency_ms: 1000,
            strategy: VotingStrategy::weighted(),
            mode: InvocationMode::Parallel,
            difficulty: 0.4,
            difficulty_bucket: DifficultyBucket::Medium,
            low_confidence: true,
            budget_constrained: false,
            from_cache: false,
            cascade_stopped_early: false,
            degradations: vec![],
            explanation: String::new(),
        }
    }

    #[test]
    fn test_explanation_mentions_everything_relevant() {
        let text = explain(
            &result(),
            &RunNotes {
                explored: Some("llm".into()),
                ..Default::default()
            },
        );
        assert!(text.starts_with("Flagged as hallucination by weighted voting"));
        assert!(text.contains("llm 0.90@0.80"));
        assert!(text.contains("Parallel invocation of 2 judge(s)"));
        assert!(text.contains("Explored llm"));
        assert!(text.contains("slow (timeout)"));
        assert!(text.contains("Low confidence"));
    }

    #[test]
    fn test_explanation_without_votes() {
        let mut r = result();
        r.aggregated_score = None;
        r.verdict = false;
        let text = explain(&r, &RunNotes::default());
        assert!(text.starts_with("No judge returned a usable verdict"));
    }
}
