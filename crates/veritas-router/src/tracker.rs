//! Performance Tracker - single owner of per-judge statistics
//!
//! A spawned task applies every update in arrival order and is the only
//! writer of the shared view. Callers only send messages (never blocking)
//! and read snapshots.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use veritas_consensus::ResultSink;
use veritas_core::{DifficultyBucket, JudgeId, JudgeResult, PerformanceStat};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// EMA smoothing factor
    pub alpha: f64,
    /// How far `decay` pulls rates toward the prior
    pub decay_factor: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            decay_factor: 0.5,
        }
    }
}

enum Command {
    Record {
        result: JudgeResult,
        bucket: DifficultyBucket,
    },
    Reset(Option<JudgeId>),
    Decay(f64),
    Flush(oneshot::Sender<()>),
}

type StatsView = Arc<RwLock<HashMap<JudgeId, PerformanceStat>>>;

pub struct PerformanceTracker;

impl PerformanceTracker {
    /// Start the tracker task. Must be called inside a Tokio runtime.
    pub fn spawn(config: TrackerConfig) -> TrackerHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let view: StatsView = Arc::new(RwLock::new(HashMap::new()));
        let writer = view.clone();
        let alpha = config.alpha.clamp(0.0, 1.0);

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Record { result, bucket } => {
                        let mut stats = writer.write();
                        stats
                            .entry(result.judge_id.clone())
                            .or_insert_with(|| PerformanceStat::new(result.judge_id.clone()))
                            .observe(&result, bucket, alpha);
                    }
                    Command::Reset(Some(id)) => {
                        writer.write().remove(&id);
                        tracing::info!(judge = %id, "Performance stats reset");
                    }
                    Command::Reset(None) => {
                        writer.write().clear();
                        tracing::info!("All performance stats reset");
                    }
                    Command::Decay(factor) => {
                        for stat in writer.write().values_mut() {
                            stat.decay(factor);
                        }
                        tracing::info!(factor, "Performance stats decayed");
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!("Performance tracker stopped");
        });

        TrackerHandle { tx, view, config }
    }
}

/// Cheap, cloneable handle to the tracker task
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::UnboundedSender<Command>,
    view: StatsView,
    config: TrackerConfig,
}

impl std::fmt::Debug for TrackerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerHandle")
            .field("judges", &self.view.read().len())
            .field("config", &self.config)
            .finish()
    }
}

impl TrackerHandle {
    /// Queue one completed call. Never blocks.
    pub fn record(&self, result: JudgeResult, bucket: DifficultyBucket) {
        if self.tx.send(Command::Record { result, bucket }).is_err() {
            tracing::warn!("Performance tracker is gone, dropping update");
        }
    }

    /// Operator action: forget one judge's history, or everyone's
    pub fn reset(&self, judge: Option<JudgeId>) {
        let _ = self.tx.send(Command::Reset(judge));
    }

    /// Operator action: pull every rate toward its prior
    pub fn decay(&self) {
        let _ = self.tx.send(Command::Decay(self.config.decay_factor));
    }

    /// Wait until every update sent before this call has been applied
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Snapshot of all stats, ordered by judge id
    pub fn snapshot(&self) -> Vec<PerformanceStat> {
        let mut stats: Vec<_> = self.view.read().values().cloned().collect();
        stats.sort_by(|a, b| a.judge_id.cmp(&b.judge_id));
        stats
    }

    pub fn stats_map(&self) -> HashMap<JudgeId, PerformanceStat> {
        self.view.read().clone()
    }

    pub fn get(&self, judge: &JudgeId) -> Option<PerformanceStat> {
        self.view.read().get(judge).cloned()
    }
}

impl ResultSink for TrackerHandle {
    fn record(&self, result: &JudgeResult, bucket: DifficultyBucket) {
        TrackerHandle::record(self, result.clone(), bucket);
    }
}
