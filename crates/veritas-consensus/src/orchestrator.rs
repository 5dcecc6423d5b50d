//! Consensus orchestrator
//!
//! Invokes the selected judges in parallel or as a cost-ordered cascade,
//! isolates per-call failures, retries once from the reserve on a shortfall
//! and folds everything that arrived into one [`ConsensusResult`].

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use veritas_core::{
    CancellationToken, ConsensusError, ConsensusResult, DetectionRequest, Difficulty,
    DifficultyBucket, InvocationMode, JudgeFailure, JudgeId, JudgeProfile, JudgeResult,
    VotingStrategy,
};
use veritas_judges::{JudgeAdapter, JudgeError, JudgeInput};

use crate::explain::{explain, RunNotes};
use crate::voting::{running_confidence, tally, Ballot};

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-call timeout (ms)
    pub timeout_per_call_ms: u64,
    /// Running confidence at which a cascade may stop
    pub stop_confidence: f64,
    /// Retry failed calls once with unused reserve judges
    pub retry_on_shortfall: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout_per_call_ms: 10_000,
            stop_confidence: 0.95,
            retry_on_shortfall: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn timeout_per_call(&self) -> Duration {
        Duration::from_millis(self.timeout_per_call_ms)
    }
}

/// A judge ready to be invoked
#[derive(Debug, Clone)]
pub struct Candidate {
    pub profile: JudgeProfile,
    pub adapter: Arc<dyn JudgeAdapter>,
}

impl Candidate {
    pub fn new(profile: JudgeProfile, adapter: Arc<dyn JudgeAdapter>) -> Self {
        Self { profile, adapter }
    }
}

/// Everything the orchestrator needs besides the selected judges
#[derive(Debug, Clone)]
pub struct InvocationPlan {
    pub strategy: VotingStrategy,
    pub mode: InvocationMode,
    pub min_models: usize,
    pub max_cost: Option<f64>,
    /// End-to-end deadline measured from the start of the run
    pub deadline: Option<Duration>,
    pub difficulty: Difficulty,
    pub budget_constrained: bool,
    /// Unused judges, cheapest first, available for one retry
    pub reserve: Vec<Candidate>,
    pub explored: Option<JudgeId>,
    /// Degradations noted before invocation, e.g. by selection
    pub degradations: Vec<ConsensusError>,
}

impl InvocationPlan {
    pub fn new(strategy: VotingStrategy, difficulty: Difficulty) -> Self {
        Self {
            mode: strategy.default_mode(),
            strategy,
            min_models: 1,
            max_cost: None,
            deadline: None,
            difficulty,
            budget_constrained: false,
            reserve: Vec::new(),
            explored: None,
            degradations: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_min_models(mut self, min_models: usize) -> Self {
        self.min_models = min_models;
        self
    }

    pub fn with_max_cost(mut self, max_cost: Option<f64>) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_reserve(mut self, reserve: Vec<Candidate>) -> Self {
        self.reserve = reserve;
        self
    }
}

/// Receives every completed judge call, e.g. the performance tracker
pub trait ResultSink: Send + Sync {
    fn record(&self, result: &JudgeResult, bucket: DifficultyBucket);
}

/// Why a batch of calls was cut short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Deadline,
    Cancelled,
}

/// Results and degradations accumulated over one run
#[derive(Default)]
struct RunState {
    results: Vec<JudgeResult>,
    degradations: Vec<ConsensusError>,
    interrupt: Option<Interrupt>,
}

impl RunState {
    fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    fn spent(&self) -> f64 {
        self.results.iter().map(|r| r.cost).sum()
    }

    fn invoked(&self) -> HashSet<JudgeId> {
        self.results.iter().map(|r| r.judge_id.clone()).collect()
    }
}

#[derive(Clone)]
pub struct ConsensusOrchestrator {
    config: OrchestratorConfig,
    sink: Option<Arc<dyn ResultSink>>,
}

impl std::fmt::Debug for ConsensusOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusOrchestrator")
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl ConsensusOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config, sink: None }
    }

    /// Forward every judge result to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Invoke `selected` for `request` and aggregate whatever comes back.
    ///
    /// Never fails: shortfalls, timeouts, a passed deadline and cancellation
    /// all yield a complete result flagged accordingly.
    pub async fn run(
        &self,
        selected: Vec<Candidate>,
        request: &DetectionRequest,
        plan: InvocationPlan,
        cancel: &CancellationToken,
    ) -> ConsensusResult {
        let started = Instant::now();
        let deadline_at = plan.deadline.map(|d| started + d);
        let input = JudgeInput::from(request);

        let weights: HashMap<JudgeId, f64> = selected
            .iter()
            .chain(plan.reserve.iter())
            .map(|c| (c.profile.id.clone(), c.profile.trust_weight))
            .collect();

        let mut state = RunState {
            degradations: plan.degradations.clone(),
            ..Default::default()
        };
        let mut notes = RunNotes {
            explored: plan.explored.clone(),
            ..Default::default()
        };
        let mut stopped_early = false;

        match plan.mode {
            InvocationMode::Parallel => {
                self.invoke_parallel(&selected, &input, deadline_at, cancel, &mut state)
                    .await;
            }
            InvocationMode::Cascading => {
                let skipped = self
                    .invoke_cascade(&selected, &input, &plan, &weights, deadline_at, cancel, &mut state)
                    .await;
                stopped_early = skipped > 0;
                notes.skipped = skipped;
            }
        }

        if state.interrupt.is_none() {
            notes.retried = self
                .retry_shortfall(&plan, &input, deadline_at, cancel, &mut state)
                .await;
        }

        match state.interrupt {
            Some(Interrupt::Deadline) => state.degradations.push(ConsensusError::DeadlineExceeded {
                deadline_ms: plan.deadline.map(|d| d.as_millis() as u64).unwrap_or_default(),
            }),
            Some(Interrupt::Cancelled) => state.degradations.push(ConsensusError::Cancelled),
            None => {}
        }

        if let Some(sink) = &self.sink {
            for result in &state.results {
                // Cancellation says nothing about the judge
                if result.error != Some(JudgeFailure::Cancelled) {
                    sink.record(result, plan.difficulty.bucket);
                }
            }
        }

        let result = self.finalize(state, request, &plan, &weights, stopped_early, started, &notes);

        metrics::counter!("veritas_consensus_runs_total", "mode" => result.mode.to_string())
            .increment(1);
        if result.cascade_stopped_early {
            metrics::counter!("veritas_cascade_early_stops_total").increment(1);
        }
        metrics::gauge!("veritas_last_agreement_ratio").set(result.agreement_ratio);

        result
    }

    #[allow(clippy::too_many_arguments)]
    fn finalize(
        &self,
        mut state: RunState,
        request: &DetectionRequest,
        plan: &InvocationPlan,
        weights: &HashMap<JudgeId, f64>,
        stopped_early: bool,
        started: Instant,
        notes: &RunNotes,
    ) -> ConsensusResult {
        state.results.sort_by(|a, b| a.judge_id.cmp(&b.judge_id));

        let ballots: Vec<Ballot> = state
            .results
            .iter()
            .filter_map(|r| Ballot::from_result(r, weights.get(&r.judge_id).copied().unwrap_or(1.0)))
            .collect();

        let tally = tally(&plan.strategy, &ballots);
        let voted = tally.map(|t| t.models_voted).unwrap_or(0);
        let low_confidence = voted < plan.min_models;
        if low_confidence {
            state.degradations.push(ConsensusError::LowConfidenceResult {
                voted,
                required: plan.min_models,
            });
        }

        let total_cost = state.results.iter().map(|r| r.cost).sum();
        let mut result = ConsensusResult {
            request_id: request.id(),
            aggregated_score: tally.map(|t| t.aggregated_score),
            verdict: tally.map(|t| t.verdict).unwrap_or(false),
            agreement_ratio: tally.map(|t| t.agreement_ratio).unwrap_or(0.0),
            models_agreed: tally.map(|t| t.models_agreed).unwrap_or(0),
            models_voted: voted,
            judge_results: state.results,
            total_cost,
            total_latency_ms: started.elapsed().as_millis() as u64,
            strategy: plan.strategy,
            mode: plan.mode,
            difficulty: plan.difficulty.score,
            difficulty_bucket: plan.difficulty.bucket,
            low_confidence,
            budget_constrained: plan.budget_constrained,
            from_cache: false,
            cascade_stopped_early: stopped_early,
            degradations: state.degradations,
            explanation: String::new(),
        };
        result.explanation = explain(&result, notes);
        result
    }

    /// Dispatch every candidate at once; stop waiting on deadline or cancel
    async fn invoke_parallel(
        &self,
        batch: &[Candidate],
        input: &JudgeInput,
        deadline_at: Option<Instant>,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) {
        if batch.is_empty() {
            return;
        }
        let started = Instant::now();
        let timeout = self.config.timeout_per_call();
        let mut outstanding: HashSet<JudgeId> = batch.iter().map(|c| c.profile.id.clone()).collect();
        let mut pending: FuturesUnordered<_> = batch
            .iter()
            .map(|candidate| call_judge(candidate, input, timeout))
            .collect();

        let interrupt = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Some(Interrupt::Cancelled),
                _ = sleep_until(deadline_at) => break Some(Interrupt::Deadline),
                next = pending.next() => match next {
                    Some(result) => {
                        outstanding.remove(&result.judge_id);
                        self.note_failure(&result, state);
                        state.results.push(result);
                    }
                    None => break None,
                },
            }
        };
        // Dropping the set drops every call still in flight
        drop(pending);

        if let Some(interrupt) = interrupt {
            let elapsed = started.elapsed().as_millis() as u64;
            let failure = match interrupt {
                Interrupt::Cancelled => JudgeFailure::Cancelled,
                Interrupt::Deadline => JudgeFailure::Timeout,
            };
            for candidate in batch.iter().filter(|c| outstanding.contains(&c.profile.id)) {
                tracing::debug!(judge = %candidate.profile.id, ?interrupt, "Abandoning judge call");
                state
                    .results
                    .push(JudgeResult::failed(candidate.profile.id.clone(), failure.clone(), elapsed));
            }
            state.interrupt = Some(interrupt);
        }
    }

    /// Invoke candidates cheapest first; returns how many were skipped by an early stop
    #[allow(clippy::too_many_arguments)]
    async fn invoke_cascade(
        &self,
        selected: &[Candidate],
        input: &JudgeInput,
        plan: &InvocationPlan,
        weights: &HashMap<JudgeId, f64>,
        deadline_at: Option<Instant>,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> usize {
        let mut order: Vec<&Candidate> = selected.iter().collect();
        order.sort_by(|a, b| {
            a.profile
                .cost_estimate
                .total_cmp(&b.profile.cost_estimate)
                .then_with(|| a.profile.id.cmp(&b.profile.id))
        });

        let timeout = self.config.timeout_per_call();
        for (position, candidate) in order.iter().enumerate() {
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Interrupt::Cancelled),
                _ = sleep_until(deadline_at) => Err(Interrupt::Deadline),
                result = call_judge(candidate, input, timeout) => Ok(result),
            };

            match outcome {
                Ok(result) => {
                    self.note_failure(&result, state);
                    state.results.push(result);
                }
                Err(interrupt) => {
                    let failure = match interrupt {
                        Interrupt::Cancelled => JudgeFailure::Cancelled,
                        Interrupt::Deadline => JudgeFailure::Timeout,
                    };
                    state.results.push(JudgeResult::failed(
                        candidate.profile.id.clone(),
                        failure,
                        started.elapsed().as_millis() as u64,
                    ));
                    state.interrupt = Some(interrupt);
                    return 0;
                }
            }

            let ballots: Vec<Ballot> = state
                .results
                .iter()
                .filter_map(|r| Ballot::from_result(r, weights.get(&r.judge_id).copied().unwrap_or(1.0)))
                .collect();
            let remaining = order.len() - position - 1;
            if remaining > 0
                && ballots.len() >= plan.min_models
                && running_confidence(&ballots) >= self.config.stop_confidence
            {
                tracing::debug!(
                    voted = ballots.len(),
                    skipped = remaining,
                    "Cascade confident enough, stopping early"
                );
                return remaining;
            }
        }
        0
    }

    /// Replace failed calls with the cheapest unused reserve judges, once
    async fn retry_shortfall(
        &self,
        plan: &InvocationPlan,
        input: &JudgeInput,
        deadline_at: Option<Instant>,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> usize {
        if !self.config.retry_on_shortfall {
            return 0;
        }
        let successes = state.successes();
        let failures = state.results.len() - successes;
        let wanted = plan.min_models.saturating_sub(successes).min(failures);
        if wanted == 0 {
            return 0;
        }

        let invoked = state.invoked();
        let mut spent = state.spent();
        let mut retry = Vec::new();
        for candidate in plan.reserve.iter().filter(|c| !invoked.contains(&c.profile.id)) {
            if retry.len() == wanted {
                break;
            }
            let affordable = plan
                .max_cost
                .map(|max| spent + candidate.profile.cost_estimate <= max + 1e-9)
                .unwrap_or(true);
            if affordable {
                spent += candidate.profile.cost_estimate;
                retry.push(candidate.clone());
            }
        }
        if retry.is_empty() {
            return 0;
        }

        tracing::info!(
            retries = retry.len(),
            successes,
            required = plan.min_models,
            "Retrying shortfall with reserve judges"
        );
        let count = retry.len();
        self.invoke_parallel(&retry, input, deadline_at, cancel, state).await;
        count
    }

    fn note_failure(&self, result: &JudgeResult, state: &mut RunState) {
        metrics::counter!("veritas_judge_calls_total", "judge" => result.judge_id.to_string())
            .increment(1);
        let degradation = match &result.error {
            None => return,
            Some(JudgeFailure::Timeout) => ConsensusError::AdapterTimeout {
                judge: result.judge_id.clone(),
                timeout_ms: self.config.timeout_per_call_ms,
            },
            Some(JudgeFailure::Error(message)) => ConsensusError::AdapterError {
                judge: result.judge_id.clone(),
                message: message.clone(),
            },
            Some(JudgeFailure::Cancelled) => return,
        };
        metrics::counter!("veritas_judge_failures_total", "judge" => result.judge_id.to_string())
            .increment(1);
        tracing::warn!(judge = %result.judge_id, error = %degradation, "Judge call failed");
        state.degradations.push(degradation);
    }
}

/// One judge call bounded by `timeout`. Never fails; failures become results.
async fn call_judge(candidate: &Candidate, input: &JudgeInput, timeout: Duration) -> JudgeResult {
    let started = Instant::now();
    let id = candidate.profile.id.clone();
    let outcome = tokio::time::timeout(timeout, candidate.adapter.invoke(input, timeout)).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(verdict)) => {
            if !(0.0..=1.0).contains(&verdict.score) || !(0.0..=1.0).contains(&verdict.confidence) {
                tracing::warn!(
                    judge = %id,
                    score = verdict.score,
                    confidence = verdict.confidence,
                    "Judge returned values outside [0, 1], clamping"
                );
            }
            tracing::debug!(judge = %id, score = verdict.score, latency_ms, "Judge answered");
            JudgeResult::success(id, verdict.score, verdict.confidence, latency_ms, verdict.cost)
        }
        Ok(Err(JudgeError::Timeout(_))) | Err(_) => JudgeResult::failed(id, JudgeFailure::Timeout, latency_ms),
        Ok(Err(e)) => JudgeResult::failed(id, JudgeFailure::Error(e.to_string()), latency_ms),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
