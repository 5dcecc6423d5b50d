//! Subcommands and the engine setup they share

pub mod detect;
pub mod info;
pub mod stats;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use veritas_judges::{CachedEmbedder, HashEmbedder, JudgesConfig};
use veritas_runtime::{global_metrics, DetectionEngine, EngineConfig};

/// Options that decide how the engine is assembled
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Judge definitions (JSON); defaults to the built-in demo judges
    #[arg(long, value_name = "FILE")]
    pub judges: Option<PathBuf>,

    /// Engine configuration (JSON); defaults to VERITAS_* environment variables
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Disable the semantic cache
    #[arg(long)]
    pub no_cache: bool,

    /// Fixed seed for judge selection
    #[arg(long)]
    pub seed: Option<u64>,
}

impl EngineArgs {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load engine config {}", path.display())),
            None => Ok(EngineConfig::from_env()),
        }
    }

    pub fn judges_config(&self) -> Result<JudgesConfig> {
        match &self.judges {
            Some(path) => JudgesConfig::from_file(path)
                .with_context(|| format!("Failed to load judges {}", path.display())),
            None => Ok(JudgesConfig::demo()),
        }
    }

    pub fn build(&self) -> Result<DetectionEngine> {
        let mut config = self.engine_config()?;
        if self.no_cache {
            config.cache.enabled = false;
        }
        let registry = self
            .judges_config()?
            .build_registry()
            .context("Invalid judge definitions")?;

        let mut builder = DetectionEngine::builder()
            .registry(registry)
            .config(config)
            .embedder(Arc::new(CachedEmbedder::wrap(HashEmbedder::default())))
            .metrics(global_metrics());
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder.build().context("Invalid engine configuration")
    }
}
