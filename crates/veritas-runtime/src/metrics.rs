//! Process-wide detection counters with Prometheus text export

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use veritas_core::{ConsensusError, ConsensusResult, JudgeFailure};

/// Costs are accumulated in millionths to stay atomic
const COST_SCALE: f64 = 1_000_000.0;

#[derive(Debug, Default)]
pub struct DetectionMetrics {
    pub detections: AtomicU64,
    /// Detections rejected with a hard error
    pub rejected: AtomicU64,
    pub flagged: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_failures: AtomicU64,
    pub judge_calls: AtomicU64,
    pub judge_failures: AtomicU64,
    pub judge_timeouts: AtomicU64,
    pub low_confidence: AtomicU64,
    pub cascade_early_stops: AtomicU64,
    pub budget_constrained: AtomicU64,
    pub cancelled: AtomicU64,
    cost_micros: AtomicU64,
}

impl DetectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished detection into the counters
    pub fn record_detection(&self, result: &ConsensusResult) {
        self.detections.fetch_add(1, Ordering::Relaxed);
        if result.verdict {
            self.flagged.fetch_add(1, Ordering::Relaxed);
        }
        if result.low_confidence {
            self.low_confidence.fetch_add(1, Ordering::Relaxed);
        }
        if result.cascade_stopped_early {
            self.cascade_early_stops.fetch_add(1, Ordering::Relaxed);
        }
        if result.budget_constrained {
            self.budget_constrained.fetch_add(1, Ordering::Relaxed);
        }
        if result.degradations.contains(&ConsensusError::Cancelled) {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }

        for judge in &result.judge_results {
            self.judge_calls.fetch_add(1, Ordering::Relaxed);
            match &judge.error {
                None => {}
                Some(JudgeFailure::Timeout) => {
                    self.judge_failures.fetch_add(1, Ordering::Relaxed);
                    self.judge_timeouts.fetch_add(1, Ordering::Relaxed);
                }
                Some(_) => {
                    self.judge_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let micros = (result.total_cost.max(0.0) * COST_SCALE).round() as u64;
        self.cost_micros.fetch_add(micros, Ordering::Relaxed);

        metrics::counter!(
            "veritas_detections_total",
            "strategy" => result.strategy.name(),
            "from_cache" => if result.from_cache { "true" } else { "false" }
        )
        .increment(1);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_failure(&self) {
        self.cache_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            detections: self.detections.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            flagged: self.flagged.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_failures: self.cache_failures.load(Ordering::Relaxed),
            judge_calls: self.judge_calls.load(Ordering::Relaxed),
            judge_failures: self.judge_failures.load(Ordering::Relaxed),
            judge_timeouts: self.judge_timeouts.load(Ordering::Relaxed),
            low_confidence: self.low_confidence.load(Ordering::Relaxed),
            cascade_early_stops: self.cascade_early_stops.load(Ordering::Relaxed),
            budget_constrained: self.budget_constrained.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            total_cost: self.cost_micros.load(Ordering::Relaxed) as f64 / COST_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub detections: u64,
    pub rejected: u64,
    pub flagged: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_failures: u64,
    pub judge_calls: u64,
    pub judge_failures: u64,
    pub judge_timeouts: u64,
    pub low_confidence: u64,
    pub cascade_early_stops: u64,
    pub budget_constrained: u64,
    pub cancelled: u64,
    pub total_cost: f64,
}

impl MetricsSnapshot {
    pub fn cache_hit_rate(&self) -> f64 {
        ratio(self.cache_hits, self.cache_hits + self.cache_misses)
    }

    pub fn judge_failure_rate(&self) -> f64 {
        ratio(self.judge_failures, self.judge_calls)
    }

    /// Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        let counters = [
            ("veritas_detections_total", "Detections completed", self.detections),
            ("veritas_detections_rejected_total", "Detections rejected with an error", self.rejected),
            ("veritas_detections_flagged_total", "Detections flagged as hallucination", self.flagged),
            ("veritas_cache_hits_total", "Semantic cache hits", self.cache_hits),
            ("veritas_cache_misses_total", "Semantic cache misses", self.cache_misses),
            ("veritas_cache_failures_total", "Semantic cache errors absorbed", self.cache_failures),
            ("veritas_judge_calls_total", "Judge invocations", self.judge_calls),
            ("veritas_judge_failures_total", "Judge invocations without a vote", self.judge_failures),
            ("veritas_judge_timeouts_total", "Judge invocations that timed out", self.judge_timeouts),
            ("veritas_low_confidence_total", "Results below the requested judge count", self.low_confidence),
            ("veritas_cascade_early_stops_total", "Cascades stopped before the last judge", self.cascade_early_stops),
            ("veritas_budget_constrained_total", "Selections limited by budget", self.budget_constrained),
            ("veritas_cancelled_total", "Detections cancelled by the caller", self.cancelled),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, value);
        }

        let gauges = [
            ("veritas_cost_total", "Judge cost spent", self.total_cost),
            ("veritas_cache_hit_rate", "Cache hits over lookups", self.cache_hit_rate()),
            ("veritas_judge_failure_rate", "Failed judge calls over calls", self.judge_failure_rate()),
        ];
        for (name, help, value) in gauges {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} gauge", name);
            let _ = writeln!(out, "{} {:.4}", name, value);
        }
        out
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

static GLOBAL_METRICS: std::sync::OnceLock<Arc<DetectionMetrics>> = std::sync::OnceLock::new();

/// Shared metrics for the whole process
pub fn global_metrics() -> Arc<DetectionMetrics> {
    GLOBAL_METRICS
        .get_or_init(|| Arc::new(DetectionMetrics::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_core::{DifficultyBucket, InvocationMode, JudgeResult, VotingStrategy};

    fn result() -> ConsensusResult {
        ConsensusResult {
            request_id: Default::default(),
            aggregated_score: Some(0.8),
            verdict: true,
            agreement_ratio: 1.0,
            models_agreed: 1,
            models_voted: 1,
            judge_results: vec![
                JudgeResult::success("a".into(), 0.8, 0.9, 10, 0.004),
                JudgeResult::failed("b".into(), JudgeFailure::Timeout, 1000),
                JudgeResult::failed("c".into(), JudgeFailure::Error("500".into()), 5),
            ],
            total_cost: 0.004,
            total_latency_ms: 1000,
            strategy: VotingStrategy::Majority,
            mode: InvocationMode::Parallel,
            difficulty: 0.1,
            difficulty_bucket: DifficultyBucket::Low,
            low_confidence: true,
            budget_constrained: false,
            from_cache: false,
            cascade_stopped_early: false,
            degradations: vec![],
            explanation: String::new(),
        }
    }

    #[test]
    fn test_record_detection() {
        let metrics = DetectionMetrics::new();
        metrics.record_detection(&result());
        metrics.record_cache_miss();
        metrics.record_cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.detections, 1);
        assert_eq!(snapshot.flagged, 1);
        assert_eq!(snapshot.judge_calls, 3);
        assert_eq!(snapshot.judge_failures, 2);
        assert_eq!(snapshot.judge_timeouts, 1);
        assert_eq!(snapshot.low_confidence, 1);
        assert!((snapshot.total_cost - 0.004).abs() < 1e-9);
        assert_eq!(snapshot.cache_hit_rate(), 0.5);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = DetectionMetrics::new();
        metrics.record_detection(&result());
        let text = metrics.snapshot().to_prometheus();
        assert!(text.contains("# TYPE veritas_detections_total counter"));
        assert!(text.contains("veritas_judge_timeouts_total 1"));
        assert!(text.contains("veritas_judge_failure_rate 0.6667"));
    }

    #[test]
    fn test_global_metrics_is_shared() {
        let a = global_metrics();
        let b = global_metrics();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
