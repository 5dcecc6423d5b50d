//! Semantic Cache - reuse verdicts for near-duplicate requests
//!
//! Entries are keyed by a fingerprint of the normalized request and its
//! scope: the strategy, the invocation mode and the attached media. A lookup
//! first tries the exact fingerprint, then the nearest embedding among live
//! entries with the same scope. Text that is merely similar never crosses
//! media, strategy or mode.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use veritas_core::{ConsensusError, ConsensusResult, DetectionRequest, VotingStrategy};
use veritas_judges::{cosine_similarity, EmbeddingProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Minimum cosine similarity for a hit
    pub similarity_threshold: f32,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: 0.95,
            ttl_secs: 86_400,
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ConsensusResult,
    scope: String,
    embedding: Vec<f32>,
    stored_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct SemanticCache {
    config: CacheConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for SemanticCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("config", &self.config)
            .field("embedder", &self.embedder.name())
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

impl SemanticCache {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: CacheConfig) -> Self {
        Self {
            config,
            embedder,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Find a stored verdict for `request` under `strategy`, produced in the
    /// same invocation mode and over the same media.
    ///
    /// `Ok(None)` is a miss. An embedding failure is reported as
    /// [`ConsensusError::CacheUnavailable`] so the caller can fall through.
    pub async fn lookup(
        &self,
        request: &DetectionRequest,
        strategy: &VotingStrategy,
    ) -> Result<Option<ConsensusResult>, ConsensusError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let scope = scope(request, strategy);
        let key = fingerprint(request, strategy);
        let exact = {
            let entries = self.entries.read();
            entries
                .get(&key)
                .filter(|e| self.is_live(e))
                .map(|e| e.result.as_cache_hit(request.id(), 1.0))
        };
        if let Some(hit) = exact {
            self.record_hit(strategy, 1.0);
            return Ok(Some(hit));
        }

        let embedding = self
            .embedder
            .embed(&embedding_text(request))
            .await
            .map_err(|e| ConsensusError::CacheUnavailable {
                reason: e.to_string(),
            })?;

        let best = {
            let entries = self.entries.read();
            entries
                .values()
                .filter(|e| e.scope == scope && self.is_live(e))
                .map(|e| (cosine_similarity(&embedding, &e.embedding), e))
                .filter(|(similarity, _)| *similarity >= self.config.similarity_threshold)
                .max_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(similarity, e)| (similarity, e.result.as_cache_hit(request.id(), similarity)))
        };

        match best {
            Some((similarity, hit)) => {
                self.record_hit(strategy, similarity);
                Ok(Some(hit))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("veritas_cache_misses_total", "strategy" => strategy.name()).increment(1);
                Ok(None)
            }
        }
    }

    /// Remember a verdict. Low-confidence, verdict-less and cache-served
    /// results are never stored. Returns whether an entry was written.
    pub async fn store(
        &self,
        request: &DetectionRequest,
        strategy: &VotingStrategy,
        result: &ConsensusResult,
    ) -> Result<bool, ConsensusError> {
        if !self.config.enabled
            || result.from_cache
            || result.low_confidence
            || result.aggregated_score.is_none()
        {
            return Ok(false);
        }

        let key = fingerprint(request, strategy);
        if self
            .entries
            .read()
            .get(&key)
            .is_some_and(|e| self.is_live(e))
        {
            return Ok(false);
        }

        let embedding = self
            .embedder
            .embed(&embedding_text(request))
            .await
            .map_err(|e| ConsensusError::CacheUnavailable {
                reason: e.to_string(),
            })?;

        let mut entries = self.entries.write();
        let ttl = self.config.ttl();
        entries.retain(|_, e| e.stored_at.elapsed() < ttl);

        while entries.len() >= self.config.max_entries.max(1) {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            tracing::debug!(fingerprint = %oldest, "Evicted oldest cache entry");
        }

        entries.insert(
            key,
            CacheEntry {
                result: result.clone(),
                scope: scope(request, strategy),
                embedding,
                stored_at: Instant::now(),
            },
        );
        metrics::gauge!("veritas_cache_entries").set(entries.len() as f64);
        Ok(true)
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            total_entries: entries.len(),
            valid_entries: entries.values().filter(|e| self.is_live(e)).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn is_live(&self, entry: &CacheEntry) -> bool {
        entry.stored_at.elapsed() < self.config.ttl()
    }

    fn record_hit(&self, strategy: &VotingStrategy, similarity: f32) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("veritas_cache_hits_total", "strategy" => strategy.name()).increment(1);
        tracing::debug!(similarity, "Semantic cache hit");
    }
}

/// Stable key for a request under one strategy
pub fn fingerprint(request: &DetectionRequest, strategy: &VotingStrategy) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(request.content()).as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize(request.context().unwrap_or_default()).as_bytes());
    hasher.update([0u8]);
    hasher.update(scope(request, strategy).as_bytes());
    hex::encode(hasher.finalize())
}

/// Everything besides the text that a verdict depends on
fn scope(request: &DetectionRequest, strategy: &VotingStrategy) -> String {
    let mode = request.mode().unwrap_or_else(|| strategy.default_mode());
    let mut media: Vec<String> = request
        .media()
        .iter()
        .map(|m| format!("{:?}:{}", m.kind, m.uri))
        .collect();
    media.sort();
    format!("{:?}|{:?}|{}", strategy, mode, media.join(","))
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn embedding_text(request: &DetectionRequest) -> String {
    let mut text = request.content().to_string();
    if let Some(context) = request.context() {
        text.push('\n');
        text.push_str(context);
    }
    for media in request.media() {
        text.push('\n');
        text.push_str(&media.uri);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use uuid::Uuid;
    use veritas_core::{DifficultyBucket, InvocationMode, JudgeResult, MediaAttachment, MediaKind};
    use veritas_judges::{EmbeddingError, HashEmbedder};

    #[derive(Debug)]
    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        fn name(&self) -> &str {
            "down"
        }

        fn dimensions(&self) -> usize {
            8
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("connection refused".into()))
        }
    }

    fn cache(config: CacheConfig) -> SemanticCache {
        SemanticCache::new(Arc::new(HashEmbedder::default()), config)
    }

    fn verdict(score: f64) -> ConsensusResult {
        ConsensusResult {
            request_id: Uuid::new_v4(),
            aggregated_score: Some(score),
            verdict: score > 0.5,
            agreement_ratio: 1.0,
            models_agreed: 2,
            models_voted: 2,
            judge_results: vec![
                JudgeResult::success("a".into(), score, 0.9, 10, 0.01),
                JudgeResult::success("b".into(), score, 0.8, 12, 0.02),
            ],
            total_cost: 0.03,
            total_latency_ms: 12,
            strategy: VotingStrategy::weighted(),
            mode: InvocationMode::Parallel,
            difficulty: 0.3,
            difficulty_bucket: DifficultyBucket::Low,
            low_confidence: false,
            budget_constrained: false,
            from_cache: false,
            cascade_stopped_early: false,
            degradations: vec![],
            explanation: "Flagged.".into(),
        }
    }

    #[tokio::test]
    async fn test_exact_repeat_hits() {
        let cache = cache(CacheConfig::default());
        let strategy = VotingStrategy::weighted();
        let first = DetectionRequest::new("The Eiffel Tower is in Berlin.");
        assert!(cache.lookup(&first, &strategy).await.unwrap().is_none());
        assert!(cache.store(&first, &strategy, &verdict(0.9)).await.unwrap());

        let again = DetectionRequest::new("the  eiffel tower is in berlin.");
        let hit = cache.lookup(&again, &strategy).await.unwrap().unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.request_id, again.id());
        assert!(hit.judge_results.is_empty());
        assert_eq!(hit.total_cost, 0.0);
        assert_eq!(hit.aggregated_score, Some(0.9));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.valid_entries, 1);
    }

    #[tokio::test]
    async fn test_strategy_must_match() {
        let cache = cache(CacheConfig::default());
        let request = DetectionRequest::new("Water boils at 50 degrees at sea level.");
        cache
            .store(&request, &VotingStrategy::weighted(), &verdict(0.8))
            .await
            .unwrap();
        let other = cache
            .lookup(&request, &VotingStrategy::Unanimous)
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_different_media_misses() {
        let cache = cache(CacheConfig::default());
        let strategy = VotingStrategy::weighted();
        let text = "This photo shows the Eiffel Tower at night.";
        let eiffel = DetectionRequest::new(text)
            .with_media(MediaAttachment::new(MediaKind::Image, "s3://b/eiffel.png"));
        assert!(cache.store(&eiffel, &strategy, &verdict(0.1)).await.unwrap());

        let big_ben = DetectionRequest::new(text)
            .with_media(MediaAttachment::new(MediaKind::Image, "s3://b/big_ben.png"));
        assert!(cache.lookup(&big_ben, &strategy).await.unwrap().is_none());
        assert!(cache
            .lookup(&DetectionRequest::new(text), &strategy)
            .await
            .unwrap()
            .is_none());

        let same = DetectionRequest::new(text)
            .with_media(MediaAttachment::new(MediaKind::Image, "s3://b/eiffel.png"));
        assert!(cache.lookup(&same, &strategy).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_media_order_does_not_matter() {
        let cache = cache(CacheConfig::default());
        let strategy = VotingStrategy::weighted();
        let image = MediaAttachment::new(MediaKind::Image, "s3://b/chart.png");
        let audio = MediaAttachment::new(MediaKind::Audio, "s3://b/call.wav");
        let first = DetectionRequest::new("Revenue doubled last quarter.")
            .with_media(image.clone())
            .with_media(audio.clone());
        cache.store(&first, &strategy, &verdict(0.7)).await.unwrap();

        let swapped = DetectionRequest::new("Revenue doubled last quarter.")
            .with_media(audio)
            .with_media(image);
        assert!(cache.lookup(&swapped, &strategy).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_forced_mode_must_match() {
        let cache = cache(CacheConfig::default());
        let strategy = VotingStrategy::weighted();
        let request = DetectionRequest::new("Mount Everest is 5000 meters tall.");
        cache.store(&request, &strategy, &verdict(0.9)).await.unwrap();

        let cascading = DetectionRequest::new("Mount Everest is 5000 meters tall.")
            .with_mode(InvocationMode::Cascading);
        assert!(cache.lookup(&cascading, &strategy).await.unwrap().is_none());

        let parallel = DetectionRequest::new("Mount Everest is 5000 meters tall.")
            .with_mode(InvocationMode::Parallel);
        assert!(cache.lookup(&parallel, &strategy).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unrelated_text_misses() {
        let cache = cache(CacheConfig::default());
        let strategy = VotingStrategy::weighted();
        cache
            .store(
                &DetectionRequest::new("The moon landing happened in 1969."),
                &strategy,
                &verdict(0.1),
            )
            .await
            .unwrap();
        let miss = cache
            .lookup(
                &DetectionRequest::new("Rust's borrow checker runs at compile time."),
                &strategy,
            )
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_low_confidence_and_cached_results_not_stored() {
        let cache = cache(CacheConfig::default());
        let strategy = VotingStrategy::weighted();
        let request = DetectionRequest::new("Some claim");

        let mut low = verdict(0.9);
        low.low_confidence = true;
        assert!(!cache.store(&request, &strategy, &low).await.unwrap());

        let mut none = verdict(0.9);
        none.aggregated_score = None;
        assert!(!cache.store(&request, &strategy, &none).await.unwrap());

        let served = verdict(0.9).as_cache_hit(Uuid::new_v4(), 0.99);
        assert!(!cache.store(&request, &strategy, &served).await.unwrap());
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = cache(CacheConfig {
            ttl_secs: 60,
            ..Default::default()
        });
        let strategy = VotingStrategy::weighted();
        let request = DetectionRequest::new("Mount Everest is 8849 meters tall.");
        cache.store(&request, &strategy, &verdict(0.2)).await.unwrap();
        assert!(cache.lookup(&request, &strategy).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.lookup(&request, &strategy).await.unwrap().is_none());
        assert_eq!(cache.stats().valid_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_oldest_at_capacity() {
        let cache = cache(CacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        let strategy = VotingStrategy::weighted();
        let texts = ["alpha claim one", "beta claim two", "gamma claim three"];
        for text in texts {
            cache
                .store(&DetectionRequest::new(text), &strategy, &verdict(0.7))
                .await
                .unwrap();
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        assert_eq!(cache.stats().total_entries, 2);
        let first = DetectionRequest::new(texts[0]);
        assert!(cache.lookup(&first, &strategy).await.unwrap().is_none());
        let last = DetectionRequest::new(texts[2]);
        assert!(cache.lookup(&last, &strategy).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_reported() {
        let cache = SemanticCache::new(Arc::new(DownEmbedder), CacheConfig::default());
        let err = cache
            .lookup(&DetectionRequest::new("anything"), &VotingStrategy::Majority)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::CacheUnavailable { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_disabled_cache_is_inert() {
        let cache = cache(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        let strategy = VotingStrategy::weighted();
        let request = DetectionRequest::new("claim");
        assert!(!cache.store(&request, &strategy, &verdict(0.9)).await.unwrap());
        assert!(cache.lookup(&request, &strategy).await.unwrap().is_none());
    }

    #[test]
    fn test_fingerprint_normalizes_whitespace_and_case() {
        let strategy = VotingStrategy::Majority;
        assert_eq!(
            fingerprint(&DetectionRequest::new("A  b\nC"), &strategy),
            fingerprint(&DetectionRequest::new("a b c"), &strategy)
        );
        assert_ne!(
            fingerprint(&DetectionRequest::new("a b c"), &strategy),
            fingerprint(&DetectionRequest::new("a b c").with_context("ctx"), &strategy)
        );
    }
}
