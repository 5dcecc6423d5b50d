//! Voting strategies over successful judge results
//!
//! Ballots are sorted by judge id before any arithmetic, so the outcome does
//! not depend on the order in which concurrent calls completed.

use serde::{Deserialize, Serialize};

use veritas_core::{JudgeId, JudgeResult, VotingStrategy, DEFAULT_WEIGHTED_THRESHOLD};

/// One successful judge result, with the judge's trust weight attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub judge_id: JudgeId,
    pub score: f64,
    pub confidence: f64,
    pub weight: f64,
}

impl Ballot {
    pub fn new(judge_id: impl Into<JudgeId>, score: f64, confidence: f64, weight: f64) -> Self {
        Self {
            judge_id: judge_id.into(),
            score,
            confidence,
            weight,
        }
    }

    /// Ballot for a result; `None` for failed calls
    pub fn from_result(result: &JudgeResult, weight: f64) -> Option<Self> {
        result.is_success().then(|| Self {
            judge_id: result.judge_id.clone(),
            score: result.score,
            confidence: result.confidence,
            weight,
        })
    }

    /// Binary vote: true means "hallucination"
    pub fn flags(&self) -> bool {
        self.score > 0.5
    }
}

/// Outcome of one voting round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub aggregated_score: f64,
    pub verdict: bool,
    pub agreement_ratio: f64,
    pub models_agreed: usize,
    pub models_voted: usize,
}

/// Apply `strategy` to `ballots`. Returns `None` when there is nothing to count.
pub fn tally(strategy: &VotingStrategy, ballots: &[Ballot]) -> Option<Tally> {
    if ballots.is_empty() {
        return None;
    }

    let mut sorted: Vec<&Ballot> = ballots.iter().collect();
    sorted.sort_by(|a, b| a.judge_id.cmp(&b.judge_id));

    let voted = sorted.len();
    let flagged = sorted.iter().filter(|b| b.flags()).count();
    let mean = sorted.iter().map(|b| b.score).sum::<f64>() / voted as f64;

    let (aggregated_score, verdict) = match strategy {
        VotingStrategy::Majority => (mean, 2 * flagged >= voted),
        VotingStrategy::Weighted { threshold } => {
            let score = weighted_score(&sorted).unwrap_or(mean);
            (score, score > *threshold)
        }
        VotingStrategy::Unanimous => (mean, flagged == voted),
        VotingStrategy::Threshold { fraction } => {
            (mean, flagged as f64 / voted as f64 >= *fraction)
        }
        VotingStrategy::Cascading => {
            let score = weighted_score(&sorted).unwrap_or(mean);
            (score, score > DEFAULT_WEIGHTED_THRESHOLD)
        }
    };

    let models_agreed = sorted.iter().filter(|b| b.flags() == verdict).count();

    Some(Tally {
        aggregated_score: unit(aggregated_score),
        verdict,
        agreement_ratio: models_agreed as f64 / voted as f64,
        models_agreed,
        models_voted: voted,
    })
}

/// Σ(s·w·c) / Σ(w·c), or `None` when every ballot has zero weight or confidence
fn weighted_score(ballots: &[&Ballot]) -> Option<f64> {
    let (numerator, denominator) = ballots.iter().fold((0.0, 0.0), |(num, den), b| {
        let wc = b.weight.max(0.0) * b.confidence;
        (num + b.score * wc, den + wc)
    });
    (denominator > 0.0).then(|| numerator / denominator)
}

/// Trust-weighted mean confidence of the ballots so far, used to stop a cascade
pub fn running_confidence(ballots: &[Ballot]) -> f64 {
    let mut sorted: Vec<&Ballot> = ballots.iter().collect();
    sorted.sort_by(|a, b| a.judge_id.cmp(&b.judge_id));

    let (numerator, denominator) = sorted.iter().fold((0.0, 0.0), |(num, den), b| {
        let w = b.weight.max(0.0);
        (num + w * b.confidence, den + w)
    });
    if denominator > 0.0 {
        unit(numerator / denominator)
    } else {
        0.0
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eiffel() -> Vec<Ballot> {
        vec![
            Ballot::new("llm", 0.95, 0.9, 1.0),
            Ballot::new("entropy", 0.88, 0.85, 1.0),
            Ballot::new("multimodal", 0.40, 0.3, 0.5),
        ]
    }

    #[test]
    fn test_weighted_example() {
        let tally = tally(&VotingStrategy::weighted(), &eiffel()).unwrap();
        let expected = (0.95 * 0.9 + 0.88 * 0.85 + 0.40 * 0.5 * 0.3) / (0.9 + 0.85 + 0.15);
        assert!((tally.aggregated_score - expected).abs() < 1e-12);
        assert!((tally.aggregated_score - 0.875).abs() < 0.001);
        assert!(tally.verdict);
        assert_eq!(tally.models_agreed, 2);
        assert_eq!(tally.models_voted, 3);
        assert!((tally.agreement_ratio - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_zero_confidence_falls_back_to_mean() {
        let ballots = vec![Ballot::new("a", 0.8, 0.0, 1.0), Ballot::new("b", 0.4, 0.0, 1.0)];
        let tally = tally(&VotingStrategy::weighted(), &ballots).unwrap();
        assert!((tally.aggregated_score - 0.6).abs() < 1e-12);
        assert!(tally.verdict);
    }

    #[test]
    fn test_majority_tie_flags() {
        let ballots = vec![Ballot::new("a", 0.9, 0.5, 1.0), Ballot::new("b", 0.1, 0.5, 1.0)];
        let tally = tally(&VotingStrategy::Majority, &ballots).unwrap();
        assert!(tally.verdict);
        assert_eq!(tally.agreement_ratio, 0.5);
    }

    #[test]
    fn test_unanimous_disagreement_is_safe() {
        let ballots = vec![
            Ballot::new("a", 0.99, 1.0, 1.0),
            Ballot::new("b", 0.98, 1.0, 1.0),
            Ballot::new("c", 0.2, 1.0, 1.0),
        ];
        let tally = tally(&VotingStrategy::Unanimous, &ballots).unwrap();
        assert!(!tally.verdict);
        assert!(tally.agreement_ratio < 1.0);
        assert_eq!(tally.models_agreed, 1);
    }

    #[test]
    fn test_unanimous_agreement_flags() {
        let ballots = vec![Ballot::new("a", 0.7, 1.0, 1.0), Ballot::new("b", 0.6, 1.0, 1.0)];
        let tally = tally(&VotingStrategy::Unanimous, &ballots).unwrap();
        assert!(tally.verdict);
        assert_eq!(tally.agreement_ratio, 1.0);
    }

    #[test]
    fn test_threshold_fraction() {
        let ballots = vec![
            Ballot::new("a", 0.9, 1.0, 1.0),
            Ballot::new("b", 0.9, 1.0, 1.0),
            Ballot::new("c", 0.1, 1.0, 1.0),
        ];
        assert!(tally(&VotingStrategy::Threshold { fraction: 0.6 }, &ballots).unwrap().verdict);
        assert!(!tally(&VotingStrategy::Threshold { fraction: 0.7 }, &ballots).unwrap().verdict);
    }

    #[test]
    fn test_cascading_resolves_as_weighted() {
        let weighted = tally(&VotingStrategy::weighted(), &eiffel()).unwrap();
        let cascading = tally(&VotingStrategy::Cascading, &eiffel()).unwrap();
        assert_eq!(weighted, cascading);
    }

    #[test]
    fn test_empty_is_none() {
        assert!(tally(&VotingStrategy::Majority, &[]).is_none());
    }

    #[test]
    fn test_running_confidence() {
        let ballots = vec![Ballot::new("a", 0.9, 1.0, 1.0), Ballot::new("b", 0.9, 0.5, 3.0)];
        assert!((running_confidence(&ballots) - 0.625).abs() < 1e-12);
        assert_eq!(running_confidence(&[]), 0.0);
    }
}
