//! # Veritas Router
//!
//! Decides which judges see a request and remembers how they did.
//!
//! - [`complexity`]: deterministic difficulty estimate for a request
//! - [`selector`]: epsilon-greedy judge selection under a budget
//! - [`tracker`]: actor that owns per-judge performance statistics
//! - [`cache`]: semantic cache of past verdicts
//!
//! ```
//! use veritas_core::DetectionRequest;
//! use veritas_router::ComplexityEstimator;
//!
//! let difficulty = ComplexityEstimator::default()
//!     .estimate(&DetectionRequest::new("The Eiffel Tower was completed in 1889."));
//! assert!((0.0..=1.0).contains(&difficulty.score));
//! ```

pub mod cache;
pub mod complexity;
pub mod selector;
pub mod tracker;

pub use cache::{fingerprint, CacheConfig, CacheStats, SemanticCache};
pub use complexity::{ComplexityEstimator, EstimatorWeights};
pub use selector::{AdaptiveSelector, Selection, SelectorConfig};
pub use tracker::{PerformanceTracker, TrackerConfig, TrackerHandle};
