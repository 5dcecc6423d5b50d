//! Circuit breaker around any judge adapter
//!
//! Three states: Closed (normal), Open (failing fast), Half-Open (testing
//! recovery). An open breaker rejects calls with [`JudgeError::CircuitOpen`]
//! so the orchestrator records a failure without waiting on a dead backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::adapter::{JudgeAdapter, JudgeError, JudgeInput, JudgeVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Successes in half-open needed to close again
    pub success_threshold: u32,
    /// Time to wait before testing recovery
    pub reset_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Judge wrapper that stops calling a backend after repeated failures
#[derive(Debug)]
pub struct ResilientJudge<J: JudgeAdapter> {
    inner: J,
    config: CircuitConfig,
    state: Mutex<BreakerState>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    circuit_opens: AtomicU32,
}

impl<J: JudgeAdapter> ResilientJudge<J> {
    pub fn new(inner: J, config: CircuitConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            circuit_opens: AtomicU32::new(0),
        }
    }

    pub fn wrap(inner: J) -> Self {
        Self::new(inner, CircuitConfig::default())
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// (calls, failures, times opened)
    pub fn stats(&self) -> (u64, u64, u32) {
        (
            self.total_calls.load(Ordering::Relaxed),
            self.total_failures.load(Ordering::Relaxed),
            self.circuit_opens.load(Ordering::Relaxed),
        )
    }

    /// Open long enough that the next call may test recovery
    fn cooled(&self, state: &BreakerState) -> bool {
        state
            .last_failure
            .map(|at| at.elapsed() >= self.config.reset_timeout)
            .unwrap_or(true)
    }

    /// False while the breaker is open and still cooling down
    pub fn accepts_calls(&self) -> bool {
        let state = self.state.lock();
        state.state != CircuitState::Open || self.cooled(&state)
    }

    fn check_circuit(&self) -> Result<(), JudgeError> {
        let mut state = self.state.lock();
        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                if self.cooled(&state) {
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    tracing::info!(judge = %self.inner.name(), "Circuit half-open, testing recovery");
                    Ok(())
                } else {
                    Err(JudgeError::CircuitOpen)
                }
            }
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        state.failure_count = 0;
        if state.state == CircuitState::HalfOpen {
            state.success_count += 1;
            if state.success_count >= self.config.success_threshold {
                state.state = CircuitState::Closed;
                state.success_count = 0;
                tracing::info!(judge = %self.inner.name(), "Circuit closed, judge recovered");
            }
        }
    }

    fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.last_failure = Some(Instant::now());

        let trip = state.state == CircuitState::HalfOpen
            || state.failure_count >= self.config.failure_threshold;
        if trip && state.state != CircuitState::Open {
            state.state = CircuitState::Open;
            self.circuit_opens.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                judge = %self.inner.name(),
                failures = state.failure_count,
                "Circuit opened"
            );
        }
    }
}

#[async_trait]
impl<J: JudgeAdapter + 'static> JudgeAdapter for ResilientJudge<J> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        self.accepts_calls() && self.inner.is_available().await
    }

    async fn invoke(&self, input: &JudgeInput, timeout: Duration) -> Result<JudgeVerdict, JudgeError> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.check_circuit()?;

        match self.inner.invoke(input, timeout).await {
            Ok(verdict) => {
                self.record_success();
                Ok(verdict)
            }
            Err(e) => {
                // Malformed answers say nothing about backend health
                if !matches!(e, JudgeError::InvalidResponse(_)) {
                    self.record_failure();
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockJudge;

    fn config() -> CircuitConfig {
        CircuitConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_passes_through_when_closed() {
        let judge = ResilientJudge::wrap(MockJudge::fixed("j", 0.2, 0.9));
        assert!(judge.judge_text("x").await.is_ok());
        assert_eq!(judge.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_then_recovers() {
        let judge = ResilientJudge::new(MockJudge::failing("j", "down"), config());
        assert!(judge.judge_text("x").await.is_err());
        assert!(judge.judge_text("x").await.is_err());
        assert_eq!(judge.circuit_state(), CircuitState::Open);
        assert!(matches!(
            judge.judge_text("x").await,
            Err(JudgeError::CircuitOpen)
        ));
        // Only two calls reached the backend
        assert_eq!(judge.inner.calls(), 2);

        tokio::time::advance(Duration::from_secs(11)).await;
        // Half-open trial call fails and re-opens the breaker
        assert!(matches!(
            judge.judge_text("x").await,
            Err(JudgeError::RequestFailed(_))
        ));
        assert_eq!(judge.circuit_state(), CircuitState::Open);
        assert_eq!(judge.stats().2, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_follows_cooldown() {
        let judge = ResilientJudge::new(MockJudge::failing("j", "down"), config());
        assert!(judge.is_available().await);
        let _ = judge.judge_text("x").await;
        let _ = judge.judge_text("x").await;
        assert_eq!(judge.circuit_state(), CircuitState::Open);
        assert!(!judge.is_available().await);

        tokio::time::advance(Duration::from_secs(11)).await;
        // Still open until a call is attempted, but ready for one
        assert_eq!(judge.circuit_state(), CircuitState::Open);
        assert!(judge.is_available().await);
    }
}
