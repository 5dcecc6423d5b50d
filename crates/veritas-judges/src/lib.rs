//! # Veritas Judges
//!
//! Judge adapters and the registry the consensus engine selects from.
//!
//! ## Supported Backends
//!
//! - **HTTP**: any service answering `{score, confidence, cost?}` to a JSON post
//! - **Mock**: scripted or heuristic local judges for tests and demos
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use veritas_core::JudgeProfile;
//! use veritas_judges::{JudgeRegistry, MockJudge};
//!
//! let mut registry = JudgeRegistry::new();
//! registry
//!     .register(
//!         JudgeProfile::new("entropy", "Entropy judge").with_cost(0.001),
//!         Arc::new(MockJudge::fixed("entropy", 0.2, 0.7)),
//!     )
//!     .unwrap();
//! assert_eq!(registry.enabled_profiles().len(), 1);
//! ```

pub mod adapter;
pub mod cached_embedder;
pub mod config;
pub mod embedding;
pub mod http;
pub mod mock;
pub mod registry;
pub mod resilient;

pub use adapter::{JudgeAdapter, JudgeError, JudgeInput, JudgeVerdict};
pub use cached_embedder::{CachedEmbedder, EmbedCacheConfig};
pub use config::{ConfigError, JudgeKind, JudgeSpec, JudgesConfig};
pub use embedding::{cosine_similarity, EmbeddingError, EmbeddingProvider, HashEmbedder};
pub use http::HttpJudge;
pub use mock::{MockBehavior, MockJudge};
pub use registry::{JudgeRegistry, RegisteredJudge, RegistryError};
pub use resilient::{CircuitConfig, CircuitState, ResilientJudge};
