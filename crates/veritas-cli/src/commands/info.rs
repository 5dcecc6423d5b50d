//! Info command - Show version, judges and configuration
//!
//! Usage:
//! ```bash
//! veritas info
//! veritas info --judges judges.json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::EngineArgs;

const ENV_VARS: &[(&str, &str)] = &[
    ("VERITAS_STRATEGY", "default voting strategy, e.g. weighted:0.5"),
    ("VERITAS_SEED", "fixed selector seed"),
    ("VERITAS_EPSILON", "initial exploration rate"),
    ("VERITAS_TIMEOUT_MS", "per-judge timeout"),
    ("VERITAS_STOP_CONFIDENCE", "cascade early-stop confidence"),
    ("VERITAS_CACHE", "enable the semantic cache (true/false)"),
    ("VERITAS_CACHE_THRESHOLD", "cache similarity threshold"),
    ("VERITAS_MAX_COST", "default per-request budget"),
    ("VERITAS_MIN_MODELS", "default minimum voting judges"),
    ("VERITAS_DEADLINE_MS", "default end-to-end deadline"),
];

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Run the info command
pub fn run(args: InfoArgs) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let config = args.engine.engine_config()?;
    let judges = args.engine.judges_config()?;

    println!("{}", "Veritas - Multi-Model Hallucination Consensus".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();

    println!("{}", "Version Information:".bold());
    println!("  {} {}", "CLI Version:".dimmed(), version.green());
    println!();

    println!("{}", "Features:".bold());
    println!("  {} Five voting strategies", "✓".green());
    println!("  {} Parallel and cost-ordered cascading invocation", "✓".green());
    println!("  {} Epsilon-greedy judge selection under a budget", "✓".green());
    println!("  {} Semantic cache of past verdicts", "✓".green());
    println!();

    println!("{}", "Judges:".bold());
    for spec in &judges.judges {
        let profile = spec.profile();
        let state = if profile.enabled {
            "●".green()
        } else {
            "○".dimmed()
        };
        println!(
            "  {} {} {} weight {:.2}, cost {:.4}, {:?}",
            state,
            profile.id.as_str().green(),
            format!("({})", profile.name).dimmed(),
            profile.trust_weight,
            profile.cost_estimate,
            profile.latency_class,
        );
    }
    println!();

    println!("{}", "Configuration:".bold());
    println!("  {} {}", "Default strategy:".dimmed(), config.default_strategy);
    println!(
        "  {} {}",
        "Min models:".dimmed(),
        config.default_budget.min_models
    );
    println!(
        "  {} {}ms",
        "Timeout per call:".dimmed(),
        config.orchestrator.timeout_per_call_ms
    );
    println!(
        "  {} {}",
        "Semantic cache:".dimmed(),
        if config.cache.enabled && !args.engine.no_cache {
            "enabled".green()
        } else {
            "disabled".yellow()
        }
    );
    println!();

    println!("{}", "Environment:".bold());
    for (name, help) in ENV_VARS {
        println!("  {} {}", name.cyan(), help.dimmed());
    }
    println!();

    Ok(())
}
