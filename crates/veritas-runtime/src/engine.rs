//! Detection Engine - the public entry point
//!
//! request → cache lookup → difficulty → selection → consensus →
//! stats update → cache write → result

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::Instrument;

use veritas_consensus::{Candidate, ConsensusOrchestrator, InvocationPlan};
use veritas_core::{
    Budget, CancellationToken, ConsensusError, ConsensusResult, DetectionRequest, JudgeId,
    JudgeProfile, PerformanceStat, VotingStrategy,
};
use veritas_judges::{EmbeddingProvider, JudgeAdapter, JudgeRegistry, RegistryError};
use veritas_router::{
    AdaptiveSelector, CacheStats, ComplexityEstimator, PerformanceTracker, SemanticCache,
    TrackerHandle,
};

use crate::config::{ConfigError, EngineConfig};
use crate::metrics::DetectionMetrics;

/// Builder for [`DetectionEngine`]
#[derive(Default)]
pub struct DetectionEngineBuilder {
    registry: JudgeRegistry,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: EngineConfig,
    seed: Option<u64>,
    metrics: Option<Arc<DetectionMetrics>>,
}

impl DetectionEngineBuilder {
    pub fn registry(mut self, registry: JudgeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Enables the semantic cache (unless disabled in the config)
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Fix the selector's RNG seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Share counters with other engines, e.g. [`crate::global_metrics`]
    pub fn metrics(mut self, metrics: Arc<DetectionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the config and start the performance tracker.
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Result<DetectionEngine, ConfigError> {
        let mut config = self.config;
        if self.seed.is_some() {
            config.selector.seed = self.seed;
        }
        config.validate()?;

        let tracker = PerformanceTracker::spawn(config.tracker.clone());
        let orchestrator = ConsensusOrchestrator::new(config.orchestrator.clone())
            .with_sink(Arc::new(tracker.clone()));
        let cache = self
            .embedder
            .filter(|_| config.cache.enabled)
            .map(|embedder| SemanticCache::new(embedder, config.cache.clone()));

        tracing::info!(
            judges = self.registry.len(),
            cache = cache.is_some(),
            strategy = %config.default_strategy,
            "Detection engine ready"
        );

        Ok(DetectionEngine {
            registry: RwLock::new(self.registry),
            estimator: ComplexityEstimator::new(config.estimator.clone()),
            selector: AdaptiveSelector::new(config.selector.clone()),
            orchestrator,
            tracker,
            cache,
            metrics: self.metrics.unwrap_or_default(),
            config,
        })
    }
}

pub struct DetectionEngine {
    config: EngineConfig,
    registry: RwLock<JudgeRegistry>,
    estimator: ComplexityEstimator,
    selector: AdaptiveSelector,
    orchestrator: ConsensusOrchestrator,
    tracker: TrackerHandle,
    cache: Option<SemanticCache>,
    metrics: Arc<DetectionMetrics>,
}

impl std::fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("judges", &self.registry.read().len())
            .field("cache", &self.cache.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl DetectionEngine {
    pub fn builder() -> DetectionEngineBuilder {
        DetectionEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// New request carrying the configured default budget
    pub fn request(&self, content: &str) -> DetectionRequest {
        DetectionRequest::new(content).with_budget(self.config.default_budget.clone())
    }

    /// Judge `request` with its own (or the default) strategy and budget.
    ///
    /// Fails only on an invalid request or when no judge is enabled; every
    /// other problem is reported inside the result.
    pub async fn detect(&self, request: DetectionRequest) -> Result<ConsensusResult, ConsensusError> {
        self.detect_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Judge `request` under an explicit strategy and budget
    pub async fn detect_with(
        &self,
        request: DetectionRequest,
        strategy: VotingStrategy,
        budget: Budget,
    ) -> Result<ConsensusResult, ConsensusError> {
        self.detect(request.with_strategy(strategy).with_budget(budget))
            .await
    }

    /// Like [`DetectionEngine::detect`]; cancelling `cancel` abandons every
    /// judge call still in flight and returns what has arrived so far.
    pub async fn detect_cancellable(
        &self,
        request: DetectionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConsensusResult, ConsensusError> {
        let span = tracing::info_span!("detect", request_id = %request.id());
        let outcome = self.run_pipeline(request, cancel).instrument(span).await;
        if outcome.is_err() {
            self.metrics.record_rejected();
        }
        outcome
    }

    async fn run_pipeline(
        &self,
        request: DetectionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConsensusResult, ConsensusError> {
        let started = Instant::now();
        request.validate()?;

        let profiles = self.available_profiles().await;
        if profiles.is_empty() {
            tracing::error!("No enabled judges can take calls");
            return Err(ConsensusError::NoAvailableJudges);
        }

        let strategy = request
            .strategy()
            .copied()
            .unwrap_or(self.config.default_strategy);
        let mut degradations = Vec::new();

        if let Some(cache) = &self.cache {
            match cache.lookup(&request, &strategy).await {
                Ok(Some(hit)) => {
                    self.metrics.record_cache_hit();
                    self.metrics.record_detection(&hit);
                    tracing::info!(verdict = hit.verdict, "Served from cache");
                    return Ok(hit);
                }
                Ok(None) => self.metrics.record_cache_miss(),
                Err(e) => {
                    tracing::warn!(error = %e, "Cache lookup failed, running full pipeline");
                    self.metrics.record_cache_failure();
                    degradations.push(e);
                }
            }
        }

        let difficulty = self.estimator.estimate(&request);
        let budget = request.budget();
        let selection = self.selector.select(
            &profiles,
            &self.tracker.stats_map(),
            &difficulty,
            budget,
        )?;

        let (selected, reserve) = {
            let registry = self.registry.read();
            (
                candidates(&registry, &selection.judges),
                candidates(&registry, &selection.reserve),
            )
        };

        let mode = request.mode().unwrap_or_else(|| strategy.default_mode());
        let mut plan = InvocationPlan::new(strategy, difficulty)
            .with_mode(mode)
            .with_min_models(budget.min_models)
            .with_max_cost(budget.max_cost)
            .with_deadline(budget.deadline().map(|d| d.saturating_sub(started.elapsed())))
            .with_reserve(reserve);
        plan.budget_constrained = selection.budget_constrained;
        plan.explored = selection.explored;
        degradations.extend(selection.degradations);
        plan.degradations = degradations;

        let mut result = self.orchestrator.run(selected, &request, plan, cancel).await;

        if let Some(cache) = &self.cache {
            if !result.degradations.contains(&ConsensusError::Cancelled) {
                if let Err(e) = cache.store(&request, &strategy, &result).await {
                    tracing::warn!(error = %e, "Cache write failed");
                    self.metrics.record_cache_failure();
                    result.degradations.push(e);
                }
            }
        }

        self.metrics.record_detection(&result);
        tracing::info!(
            verdict = result.verdict,
            score = ?result.aggregated_score,
            voted = result.models_voted,
            cost = result.total_cost,
            low_confidence = result.low_confidence,
            latency_ms = started.elapsed().as_millis() as u64,
            "Detection complete"
        );
        Ok(result)
    }

    /// Enabled judges whose adapters currently accept calls
    async fn available_profiles(&self) -> Vec<JudgeProfile> {
        let enabled: Vec<(JudgeProfile, Arc<dyn JudgeAdapter>)> = {
            let registry = self.registry.read();
            registry
                .enabled_profiles()
                .into_iter()
                .filter_map(|p| registry.adapter(&p.id).map(|adapter| (p, adapter)))
                .collect()
        };

        let mut available = Vec::with_capacity(enabled.len());
        for (profile, adapter) in enabled {
            if adapter.is_available().await {
                available.push(profile);
            } else {
                tracing::debug!(judge = %profile.id, "Judge unavailable, skipping");
            }
        }
        available
    }

    /// Per-judge statistics, ordered by judge id
    pub fn performance_stats(&self) -> Vec<PerformanceStat> {
        self.tracker.snapshot()
    }

    /// Wait until every finished call is reflected in the statistics
    pub async fn flush_stats(&self) {
        self.tracker.flush().await;
    }

    pub fn reset_stats(&self, judge: Option<JudgeId>) {
        self.tracker.reset(judge);
    }

    pub fn decay_stats(&self) {
        self.tracker.decay();
    }

    pub fn set_judge_enabled(&self, judge: &JudgeId, enabled: bool) -> Result<(), RegistryError> {
        self.registry.write().set_enabled(judge, enabled)
    }

    pub fn judges(&self) -> Vec<JudgeProfile> {
        self.registry.read().profiles()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(SemanticCache::stats)
    }

    pub fn metrics(&self) -> &DetectionMetrics {
        &self.metrics
    }

    /// Current exploration probability of the selector
    pub fn exploration_rate(&self) -> f64 {
        self.selector.epsilon()
    }
}

fn candidates(registry: &JudgeRegistry, profiles: &[JudgeProfile]) -> Vec<Candidate> {
    profiles
        .iter()
        .filter_map(|p| {
            registry
                .adapter(&p.id)
                .map(|adapter| Candidate::new(p.clone(), adapter))
        })
        .collect()
}
