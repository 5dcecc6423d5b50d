//! Judge configuration
//!
//! Describes which judges to register at startup. Loaded from JSON by the CLI.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use veritas_core::{JudgeProfile, LatencyClass};

use crate::adapter::JudgeAdapter;
use crate::http::HttpJudge;
use crate::mock::MockJudge;
use crate::registry::{JudgeRegistry, RegistryError};
use crate::resilient::ResilientJudge;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("Failed to parse judge config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Backend of a configured judge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JudgeKind {
    /// Remote judge posting JSON to `endpoint`
    Http {
        endpoint: String,
        /// Environment variable holding a bearer token
        #[serde(default)]
        api_key_env: Option<String>,
    },
    /// Local judge scoring overclaim markers (demo)
    Heuristic { sensitivity: f64, confidence: f64 },
    /// Local judge with a constant answer
    Fixed { score: f64, confidence: f64 },
    /// Local judge that always errors
    Failing { message: String },
}

fn default_weight() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

/// One judge entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: JudgeKind,
    #[serde(default = "default_weight")]
    pub trust_weight: f64,
    #[serde(default)]
    pub cost_estimate: f64,
    #[serde(default)]
    pub latency_class: LatencyClass,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Simulated latency for local judges
    #[serde(default)]
    pub latency_ms: Option<u64>,
    /// Wrap the adapter in a circuit breaker
    #[serde(default)]
    pub circuit_breaker: bool,
}

impl JudgeSpec {
    pub fn profile(&self) -> JudgeProfile {
        let mut profile = JudgeProfile::new(self.id.as_str(), self.name.as_deref().unwrap_or(&self.id))
            .with_weight(self.trust_weight)
            .with_cost(self.cost_estimate)
            .with_latency_class(self.latency_class);
        profile.enabled = self.enabled;
        profile
    }

    fn adapter(&self) -> Result<Arc<dyn JudgeAdapter>, ConfigError> {
        let latency = Duration::from_millis(self.latency_ms.unwrap_or(10));
        let adapter: Arc<dyn JudgeAdapter> = match &self.kind {
            JudgeKind::Http {
                endpoint,
                api_key_env,
            } => {
                let mut judge = HttpJudge::new(&self.id, endpoint).with_default_cost(self.cost_estimate);
                if let Some(var) = api_key_env {
                    let key = std::env::var(var).map_err(|_| ConfigError::MissingEnvVar(var.clone()))?;
                    judge = judge.with_api_key(&key);
                }
                self.maybe_resilient(judge)
            }
            JudgeKind::Heuristic {
                sensitivity,
                confidence,
            } => self.maybe_resilient(
                MockJudge::heuristic(&self.id, *sensitivity, *confidence)
                    .with_latency(latency)
                    .with_cost(self.cost_estimate),
            ),
            JudgeKind::Fixed { score, confidence } => self.maybe_resilient(
                MockJudge::fixed(&self.id, *score, *confidence)
                    .with_latency(latency)
                    .with_cost(self.cost_estimate),
            ),
            JudgeKind::Failing { message } => self.maybe_resilient(
                MockJudge::failing(&self.id, message).with_latency(latency),
            ),
        };
        Ok(adapter)
    }

    fn maybe_resilient<J: JudgeAdapter + 'static>(&self, judge: J) -> Arc<dyn JudgeAdapter> {
        if self.circuit_breaker {
            Arc::new(ResilientJudge::wrap(judge))
        } else {
            Arc::new(judge)
        }
    }
}

/// Set of judges to register
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgesConfig {
    pub judges: Vec<JudgeSpec>,
}

impl JudgesConfig {
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

    /// Three local judges standing in for an LLM judge, a statistical
    /// judge and a multimodal judge
    pub fn demo() -> Self {
        let local = |id: &str, sensitivity: f64, confidence: f64| JudgeSpec {
            id: id.to_string(),
            name: None,
            kind: JudgeKind::Heuristic {
                sensitivity,
                confidence,
            },
            trust_weight: 1.0,
            cost_estimate: 0.0,
            latency_class: LatencyClass::Standard,
            enabled: true,
            latency_ms: None,
            circuit_breaker: false,
        };

        Self {
            judges: vec![
                JudgeSpec {
                    name: Some("LLM judge".to_string()),
                    cost_estimate: 0.004,
                    latency_ms: Some(40),
                    ..local("llm", 1.0, 0.85)
                },
                JudgeSpec {
                    name: Some("Entropy judge".to_string()),
                    trust_weight: 0.5,
                    cost_estimate: 0.0005,
                    latency_class: LatencyClass::Fast,
                    latency_ms: Some(5),
                    ..local("entropy", 0.8, 0.6)
                },
                JudgeSpec {
                    name: Some("Multimodal judge".to_string()),
                    trust_weight: 0.8,
                    cost_estimate: 0.012,
                    latency_class: LatencyClass::Slow,
                    latency_ms: Some(80),
                    ..local("multimodal", 0.9, 0.8)
                },
            ],
        }
    }

    /// Build adapters and register them in order
    pub fn build_registry(&self) -> Result<JudgeRegistry, ConfigError> {
        let mut registry = JudgeRegistry::new();
        for spec in &self.judges {
            registry.register(spec.profile(), spec.adapter()?)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_core::JudgeId;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "judges": [
                {"id": "gpt", "type": "http", "endpoint": "http://localhost:8080/judge",
                 "trust_weight": 1.0, "cost_estimate": 0.01, "latency_class": "slow"},
                {"id": "stat", "type": "fixed", "score": 0.2, "confidence": 0.6,
                 "latency_class": "fast", "enabled": false}
            ]
        }"#;
        let config = JudgesConfig::from_json_str(json).unwrap();
        assert_eq!(config.judges.len(), 2);
        assert_eq!(config.judges[0].latency_class, LatencyClass::Slow);
        assert!(!config.judges[1].enabled);
        assert_eq!(config.judges[1].trust_weight, 1.0);

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.enabled_profiles().len(), 1);
        assert_eq!(
            registry.get(&JudgeId::new("gpt")).unwrap().profile.cost_estimate,
            0.01
        );
    }

    #[test]
    fn test_missing_api_key_env() {
        let json = r#"{"judges": [{"id": "gpt", "type": "http",
            "endpoint": "http://localhost/judge", "api_key_env": "VERITAS_TEST_UNSET_KEY_7731"}]}"#;
        let config = JudgesConfig::from_json_str(json).unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut config = JudgesConfig::demo();
        config.judges.push(config.judges[0].clone());
        assert!(matches!(
            config.build_registry(),
            Err(ConfigError::Registry(RegistryError::DuplicateJudge(_)))
        ));
    }

    #[test]
    fn test_demo_registry() {
        let registry = JudgesConfig::demo().build_registry().unwrap();
        let ids: Vec<_> = registry.profiles().into_iter().map(|p| p.id).collect();
        assert_eq!(
            ids,
            vec![JudgeId::new("llm"), JudgeId::new("entropy"), JudgeId::new("multimodal")]
        );
    }
}
