//! Rolling per-judge performance statistics

use serde::{Deserialize, Serialize};

use crate::difficulty::DifficultyBucket;
use crate::judge::{JudgeId, JudgeResult};

/// Prior assumed for rates of a judge that has never been observed
pub const PRIOR_RATE: f64 = 0.5;

/// Exponential moving averages for one slice of a judge's history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketStat {
    /// Observations folded into this slice
    pub calls: u64,
    /// Observations that produced a vote
    pub voted: u64,
    /// EMA of the success indicator, in [0, 1]
    pub success_rate: f64,
    /// EMA of reported confidence on successful calls, in [0, 1]
    pub mean_confidence: f64,
    /// EMA of observed latency (ms)
    pub mean_latency_ms: f64,
    /// EMA of charged cost
    pub mean_cost: f64,
}

impl Default for BucketStat {
    fn default() -> Self {
        Self {
            calls: 0,
            voted: 0,
            success_rate: PRIOR_RATE,
            mean_confidence: PRIOR_RATE,
            mean_latency_ms: 0.0,
            mean_cost: 0.0,
        }
    }
}

impl BucketStat {
    /// Fold one call into the averages. The first observation seeds them.
    pub fn observe(&mut self, result: &JudgeResult, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        let first = self.calls == 0;
        let success = if result.is_success() { 1.0 } else { 0.0 };

        self.success_rate = ema(self.success_rate, success, alpha, first).clamp(0.0, 1.0);
        if result.is_success() {
            // Confidence only exists for calls that voted
            self.mean_confidence =
                ema(self.mean_confidence, result.confidence, alpha, self.voted == 0).clamp(0.0, 1.0);
            self.voted = self.voted.saturating_add(1);
        }
        self.mean_latency_ms = ema(self.mean_latency_ms, result.latency_ms as f64, alpha, first).max(0.0);
        self.mean_cost = ema(self.mean_cost, result.cost, alpha, first).max(0.0);
        self.calls = self.calls.saturating_add(1);
    }

    /// Expected usefulness of a vote from this slice
    pub fn quality(&self) -> f64 {
        (self.success_rate * self.mean_confidence).clamp(0.0, 1.0)
    }

    /// Pull rates toward the prior by `factor` (0 = unchanged, 1 = prior)
    pub fn decay(&mut self, factor: f64) {
        let factor = factor.clamp(0.0, 1.0);
        self.success_rate += (PRIOR_RATE - self.success_rate) * factor;
        self.mean_confidence += (PRIOR_RATE - self.mean_confidence) * factor;
    }
}

fn ema(previous: f64, sample: f64, alpha: f64, first: bool) -> f64 {
    if first {
        sample
    } else {
        previous + alpha * (sample - previous)
    }
}

/// Rolling statistics for one judge, overall and per difficulty bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStat {
    pub judge_id: JudgeId,
    /// Total calls observed
    pub calls: u64,
    /// Calls that failed, timed out or were cancelled
    pub failures: u64,
    /// Averages across every bucket
    pub overall: BucketStat,
    /// Averages per difficulty bucket, indexed by [`DifficultyBucket::index`]
    pub buckets: [BucketStat; 3],
}

impl PerformanceStat {
    pub fn new(judge_id: JudgeId) -> Self {
        Self {
            judge_id,
            calls: 0,
            failures: 0,
            overall: BucketStat::default(),
            buckets: [BucketStat::default(); 3],
        }
    }

    /// Apply one completed call
    pub fn observe(&mut self, result: &JudgeResult, bucket: DifficultyBucket, alpha: f64) {
        self.calls = self.calls.saturating_add(1);
        if !result.is_success() {
            self.failures = self.failures.saturating_add(1);
        }
        self.overall.observe(result, alpha);
        self.buckets[bucket.index()].observe(result, alpha);
    }

    pub fn bucket(&self, bucket: DifficultyBucket) -> &BucketStat {
        &self.buckets[bucket.index()]
    }

    pub fn success_rate(&self) -> f64 {
        self.overall.success_rate
    }

    pub fn mean_confidence(&self) -> f64 {
        self.overall.mean_confidence
    }

    pub fn mean_latency_ms(&self) -> f64 {
        self.overall.mean_latency_ms
    }

    pub fn mean_cost(&self) -> f64 {
        self.overall.mean_cost
    }

    /// Quality for a bucket, falling back to overall and then to the prior
    pub fn quality_for(&self, bucket: DifficultyBucket) -> f64 {
        let slice = self.bucket(bucket);
        if slice.calls > 0 {
            slice.quality()
        } else {
            self.overall_quality()
        }
    }

    pub fn overall_quality(&self) -> f64 {
        if self.overall.calls > 0 {
            self.overall.quality()
        } else {
            PRIOR_RATE * PRIOR_RATE
        }
    }

    pub fn decay(&mut self, factor: f64) {
        self.overall.decay(factor);
        for slice in &mut self.buckets {
            slice.decay(factor);
        }
    }
}
