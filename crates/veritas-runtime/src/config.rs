//! Engine configuration
//!
//! Defaults are usable as-is. [`EngineConfig::from_env`] overrides them
//! from `VERITAS_*` variables; unparsable values fall back to the default.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use veritas_consensus::OrchestratorConfig;
use veritas_core::{Budget, VotingStrategy};
use veritas_router::{CacheConfig, EstimatorWeights, SelectorConfig, TrackerConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub selector: SelectorConfig,
    pub orchestrator: OrchestratorConfig,
    pub tracker: TrackerConfig,
    pub cache: CacheConfig,
    pub estimator: EstimatorWeights,
    /// Used when a request does not force a strategy
    pub default_strategy: VotingStrategy,
    /// Budget the CLI and helpers attach to new requests
    pub default_budget: Budget,
}

impl EngineConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` as the variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let parse_f64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
        let parse_u64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let parse_bool = |key: &str| lookup(key).map(|v| v != "0" && v.to_lowercase() != "false");

        if let Some(strategy) = lookup("VERITAS_STRATEGY").and_then(|v| VotingStrategy::parse(&v).ok()) {
            config.default_strategy = strategy;
        }

        if let Some(v) = parse_f64("VERITAS_EPSILON") {
            config.selector.epsilon = v;
        }
        if let Some(v) = parse_f64("VERITAS_EPSILON_DECAY") {
            config.selector.epsilon_decay = v;
        }
        if let Some(v) = parse_f64("VERITAS_MIN_EPSILON") {
            config.selector.min_epsilon = v;
        }
        config.selector.seed = parse_u64("VERITAS_SEED");

        if let Some(v) = parse_u64("VERITAS_TIMEOUT_MS") {
            config.orchestrator.timeout_per_call_ms = v;
        }
        if let Some(v) = parse_f64("VERITAS_STOP_CONFIDENCE") {
            config.orchestrator.stop_confidence = v;
        }
        if let Some(v) = parse_bool("VERITAS_RETRY") {
            config.orchestrator.retry_on_shortfall = v;
        }

        if let Some(v) = parse_f64("VERITAS_TRACKER_ALPHA") {
            config.tracker.alpha = v;
        }

        if let Some(v) = parse_bool("VERITAS_CACHE") {
            config.cache.enabled = v;
        }
        if let Some(v) = parse_f64("VERITAS_CACHE_THRESHOLD") {
            config.cache.similarity_threshold = v as f32;
        }
        if let Some(v) = parse_u64("VERITAS_CACHE_TTL_SECS") {
            config.cache.ttl_secs = v;
        }
        if let Some(v) = parse_u64("VERITAS_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = v as usize;
        }

        if let Some(v) = parse_f64("VERITAS_MAX_COST") {
            config.default_budget.max_cost = Some(v);
        }
        if let Some(v) = parse_u64("VERITAS_MIN_MODELS") {
            config.default_budget.min_models = v as usize;
        }
        if let Some(v) = parse_u64("VERITAS_MAX_LATENCY_MS") {
            config.default_budget.max_latency_ms = Some(v);
        }
        if let Some(v) = parse_u64("VERITAS_DEADLINE_MS") {
            config.default_budget.deadline_ms = Some(v);
        }

        config
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{} must be within [0, 1], got {}", name, v)))
            }
        };

        let s = &self.selector;
        unit("selector.epsilon", s.epsilon)?;
        unit("selector.min_epsilon", s.min_epsilon)?;
        if s.min_epsilon > s.epsilon {
            return Err(ConfigError::Invalid(format!(
                "selector.min_epsilon ({}) is above selector.epsilon ({})",
                s.min_epsilon, s.epsilon
            )));
        }
        if !(s.epsilon_decay > 0.0 && s.epsilon_decay <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "selector.epsilon_decay must be within (0, 1], got {}",
                s.epsilon_decay
            )));
        }
        for (name, weight) in [
            ("selector.quality_weight", s.quality_weight),
            ("selector.cost_weight", s.cost_weight),
            ("selector.bucket_weight", s.bucket_weight),
        ] {
            if weight.is_nan() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be >= 0, got {}", name, weight)));
            }
        }

        if self.orchestrator.timeout_per_call_ms == 0 {
            return Err(ConfigError::Invalid("orchestrator.timeout_per_call_ms must be > 0".into()));
        }
        unit("orchestrator.stop_confidence", self.orchestrator.stop_confidence)?;

        if !(self.tracker.alpha > 0.0 && self.tracker.alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "tracker.alpha must be within (0, 1], got {}",
                self.tracker.alpha
            )));
        }
        unit("tracker.decay_factor", self.tracker.decay_factor)?;

        unit("cache.similarity_threshold", self.cache.similarity_threshold as f64)?;
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be > 0".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be > 0".into()));
        }

        self.default_strategy
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.default_budget.min_models == 0 {
            return Err(ConfigError::Invalid("default_budget.min_models must be >= 1".into()));
        }
        Ok(())
    }

    pub fn timeout_per_call(&self) -> Duration {
        self.orchestrator.timeout_per_call()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_strategy, VotingStrategy::weighted());
        assert_eq!(config.default_budget.min_models, 2);
        assert_eq!(config.cache.similarity_threshold, 0.95);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("VERITAS_STRATEGY", "threshold:0.7"),
            ("VERITAS_SEED", "42"),
            ("VERITAS_TIMEOUT_MS", "2500"),
            ("VERITAS_CACHE", "false"),
            ("VERITAS_MAX_COST", "0.02"),
            ("VERITAS_MIN_MODELS", "3"),
        ]));
        assert_eq!(config.default_strategy, VotingStrategy::Threshold { fraction: 0.7 });
        assert_eq!(config.selector.seed, Some(42));
        assert_eq!(config.orchestrator.timeout_per_call_ms, 2500);
        assert!(!config.cache.enabled);
        assert_eq!(config.default_budget.max_cost, Some(0.02));
        assert_eq!(config.default_budget.min_models, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_env_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("VERITAS_STRATEGY", "plurality"),
            ("VERITAS_EPSILON", "lots"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut config = EngineConfig::default();
        config.selector.min_epsilon = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.default_strategy = VotingStrategy::Weighted { threshold: 1.5 };
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.tracker.alpha = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{"default_strategy": {"type": "unanimous"}, "cache": {"enabled": false, "similarity_threshold": 0.9, "ttl_secs": 60, "max_entries": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.default_strategy, VotingStrategy::Unanimous);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.selector, SelectorConfig::default());
    }
}
