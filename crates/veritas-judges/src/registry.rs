//! Startup-time registry of judges keyed by stable id

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use veritas_core::{JudgeId, JudgeProfile};

use crate::adapter::JudgeAdapter;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Judge {0} is already registered")]
    DuplicateJudge(JudgeId),
    #[error("Unknown judge: {0}")]
    UnknownJudge(JudgeId),
    #[error("Invalid profile for {id}: {reason}")]
    InvalidProfile { id: JudgeId, reason: String },
}

/// A profile together with the adapter that serves it
#[derive(Debug, Clone)]
pub struct RegisteredJudge {
    pub profile: JudgeProfile,
    pub adapter: Arc<dyn JudgeAdapter>,
}

/// Registry of judges. Registration order is preserved for listing.
#[derive(Debug, Default, Clone)]
pub struct JudgeRegistry {
    entries: Vec<RegisteredJudge>,
    by_id: HashMap<JudgeId, usize>,
}

impl JudgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a judge. Ids must be unique, weights positive and costs non-negative.
    pub fn register(
        &mut self,
        profile: JudgeProfile,
        adapter: Arc<dyn JudgeAdapter>,
    ) -> Result<(), RegistryError> {
        if self.by_id.contains_key(&profile.id) {
            return Err(RegistryError::DuplicateJudge(profile.id));
        }
        if !(profile.trust_weight > 0.0) || !profile.trust_weight.is_finite() {
            return Err(RegistryError::InvalidProfile {
                id: profile.id,
                reason: format!("trust weight must be positive, got {}", profile.trust_weight),
            });
        }
        if profile.cost_estimate.is_nan() || profile.cost_estimate < 0.0 {
            return Err(RegistryError::InvalidProfile {
                id: profile.id,
                reason: format!("cost estimate must be >= 0, got {}", profile.cost_estimate),
            });
        }

        tracing::debug!(judge = %profile.id, adapter = adapter.name(), "Registered judge");
        self.by_id.insert(profile.id.clone(), self.entries.len());
        self.entries.push(RegisteredJudge { profile, adapter });
        Ok(())
    }

    /// Builder-style registration
    pub fn with(
        mut self,
        profile: JudgeProfile,
        adapter: Arc<dyn JudgeAdapter>,
    ) -> Result<Self, RegistryError> {
        self.register(profile, adapter)?;
        Ok(self)
    }

    pub fn get(&self, id: &JudgeId) -> Option<&RegisteredJudge> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn adapter(&self, id: &JudgeId) -> Option<Arc<dyn JudgeAdapter>> {
        self.get(id).map(|entry| entry.adapter.clone())
    }

    pub fn profiles(&self) -> Vec<JudgeProfile> {
        self.entries.iter().map(|e| e.profile.clone()).collect()
    }

    pub fn enabled_profiles(&self) -> Vec<JudgeProfile> {
        self.entries
            .iter()
            .filter(|e| e.profile.enabled)
            .map(|e| e.profile.clone())
            .collect()
    }

    /// Operator action: take a judge in or out of rotation
    pub fn set_enabled(&mut self, id: &JudgeId, enabled: bool) -> Result<(), RegistryError> {
        let idx = *self
            .by_id
            .get(id)
            .ok_or_else(|| RegistryError::UnknownJudge(id.clone()))?;
        self.entries[idx].profile.enabled = enabled;
        tracing::info!(judge = %id, enabled, "Judge rotation changed");
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredJudge> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockJudge;

    fn mock(id: &str) -> (JudgeProfile, Arc<dyn JudgeAdapter>) {
        (
            JudgeProfile::new(id, id),
            Arc::new(MockJudge::fixed(id, 0.5, 0.5)),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = JudgeRegistry::new();
        let (p, a) = mock("llm");
        registry.register(p, a).unwrap();
        let (p, a) = mock("entropy");
        registry.register(p, a).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&JudgeId::new("llm")).is_some());
        assert!(registry.get(&JudgeId::new("missing")).is_none());
        let ids: Vec<_> = registry.profiles().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![JudgeId::new("llm"), JudgeId::new("entropy")]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = JudgeRegistry::new();
        let (p, a) = mock("llm");
        registry.register(p.clone(), a.clone()).unwrap();
        assert_eq!(
            registry.register(p, a),
            Err(RegistryError::DuplicateJudge(JudgeId::new("llm")))
        );
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let mut registry = JudgeRegistry::new();
        let (p, a) = mock("llm");
        let err = registry.register(p.with_weight(0.0), a).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidProfile { .. }));
    }

    #[test]
    fn test_set_enabled() {
        let mut registry = JudgeRegistry::new();
        let (p, a) = mock("llm");
        registry.register(p, a).unwrap();
        registry.set_enabled(&JudgeId::new("llm"), false).unwrap();
        assert!(registry.enabled_profiles().is_empty());
        assert!(registry.set_enabled(&JudgeId::new("nope"), true).is_err());
    }
}
