//! # Veritas Consensus
//!
//! Turns a set of selected judges into one verdict.
//!
//! - [`voting`]: the five voting strategies over successful judge results
//! - [`orchestrator`]: parallel and cascading invocation with timeouts,
//!   deadline, cancellation and a single shortfall retry
//! - [`explain`]: the explanation string attached to every result

pub mod explain;
pub mod orchestrator;
pub mod voting;

pub use explain::{explain, RunNotes};
pub use orchestrator::{
    Candidate, ConsensusOrchestrator, InvocationPlan, OrchestratorConfig, ResultSink,
};
pub use voting::{running_confidence, tally, Ballot, Tally};
