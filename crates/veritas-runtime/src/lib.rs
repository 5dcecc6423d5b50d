//! # Veritas Runtime
//!
//! [`DetectionEngine`] glues the semantic cache, difficulty estimation,
//! adaptive selection, consensus and performance tracking into the single
//! `detect` entry point.
//!
//! ```no_run
//! use std::sync::Arc;
//! use veritas_core::DetectionRequest;
//! use veritas_judges::{HashEmbedder, JudgesConfig};
//! use veritas_runtime::DetectionEngine;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DetectionEngine::builder()
//!     .registry(JudgesConfig::demo().build_registry()?)
//!     .embedder(Arc::new(HashEmbedder::default()))
//!     .build()?;
//!
//! let result = engine
//!     .detect(DetectionRequest::new("The Eiffel Tower is in London."))
//!     .await?;
//! println!("{}", result.explanation);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod metrics;

pub use config::{ConfigError, EngineConfig};
pub use engine::{DetectionEngine, DetectionEngineBuilder};
pub use metrics::{global_metrics, DetectionMetrics, MetricsSnapshot};
