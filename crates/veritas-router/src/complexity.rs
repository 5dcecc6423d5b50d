//! Complexity Estimator - how hard is a request to judge
//!
//! Pure and deterministic: identical requests always get identical scores,
//! which keeps judge selection reproducible.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use veritas_core::{DetectionRequest, Difficulty, DifficultySignals};

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").expect("static regex"));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?\b").expect("static regex"));
static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+(?:\.\d+)?\s*%|\bpercent\b").expect("static regex"));
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2}\b").expect("static regex")
});
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z]+(?:_[a-z0-9]+)+\b|\b[a-z]+[A-Z][A-Za-z0-9]*\b|\bv?\d+\.\d+\.\d+\b").expect("static regex"));

const TECHNICAL_TERMS: &[&str] = &[
    "algorithm", "api", "protocol", "latency", "throughput", "kernel", "compiler", "database",
    "encryption", "neural", "gradient", "tensor", "quantum", "enzyme", "protein", "molecule",
    "genome", "dosage", "diagnosis", "statute", "jurisdiction", "liability", "derivative",
    "equity", "amortization", "theorem", "integral", "eigenvalue", "isotope", "voltage",
];

const HEDGES: &[&str] = &[
    "might", "may ", "possibly", "perhaps", "likely", "probably", "i think", "i believe",
    "it seems", "appears to", "approximately", "roughly", "not sure", "could be", "unclear",
];

/// Fixed weights combining the individual signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorWeights {
    pub length: f64,
    pub technical: f64,
    pub factual: f64,
    /// Subtracted: hedged output is easier to judge
    pub hedging: f64,
    /// Added when media is attached
    pub multimodal: f64,
    /// Word count at which the length signal reaches ~63%
    pub length_scale_words: f64,
}

impl Default for EstimatorWeights {
    fn default() -> Self {
        Self {
            length: 0.35,
            technical: 0.25,
            factual: 0.40,
            hedging: 0.30,
            multimodal: 0.10,
            length_scale_words: 120.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComplexityEstimator {
    weights: EstimatorWeights,
}

impl ComplexityEstimator {
    pub fn new(weights: EstimatorWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &EstimatorWeights {
        &self.weights
    }

    pub fn estimate(&self, request: &DetectionRequest) -> Difficulty {
        let signals = self.signals(request.content(), !request.media().is_empty());
        let w = &self.weights;
        let score = w.length * signals.length
            + w.technical * signals.technical
            + w.factual * signals.factual
            - w.hedging * signals.hedging
            + w.multimodal * signals.multimodal;
        Difficulty::new(score, signals)
    }

    pub fn signals(&self, content: &str, has_media: bool) -> DifficultySignals {
        let lower = content.to_lowercase();
        let words: Vec<&str> = content.split_whitespace().collect();
        let word_count = words.len() as f64;

        let length = 1.0 - (-word_count / self.weights.length_scale_words.max(1.0)).exp();

        let technical = if words.is_empty() {
            0.0
        } else {
            let terms = words
                .iter()
                .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
                .filter(|w| TECHNICAL_TERMS.contains(&w.as_str()))
                .count();
            let identifiers = IDENTIFIER.find_iter(content).count();
            ((terms + identifiers) as f64 * 8.0 / word_count).min(1.0)
        };

        let assertions = YEAR.find_iter(content).count()
            + NUMBER.find_iter(content).count()
            + PERCENT.find_iter(content).count()
            + DATE.find_iter(content).count()
            + named_entities(content);
        let factual = 1.0 - (-(assertions as f64) / 3.0).exp();

        let hedges = HEDGES.iter().filter(|h| lower.contains(*h)).count();
        let hedging = (hedges as f64 / 3.0).min(1.0);

        DifficultySignals {
            length,
            technical,
            factual,
            hedging,
            multimodal: if has_media { 1.0 } else { 0.0 },
        }
    }
}

/// Capitalized words that do not open a sentence
fn named_entities(content: &str) -> usize {
    content
        .split(['.', '!', '?', '\n'])
        .map(|sentence| {
            sentence
                .split_whitespace()
                .skip(1)
                .filter(|w| {
                    let w = w.trim_matches(|c: char| !c.is_alphanumeric());
                    w.len() > 1 && w.chars().next().is_some_and(char::is_uppercase)
                })
                .count()
        })
        .sum()
}
