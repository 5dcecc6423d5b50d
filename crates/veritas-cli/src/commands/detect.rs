//! Detect command - judge one statement
//!
//! Usage:
//! ```bash
//! veritas detect "The Eiffel Tower is in London"
//! veritas detect "..." --context "..." --strategy threshold:0.6 --json
//! ```

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use std::time::Duration;

use veritas_core::{ConsensusResult, InvocationMode, VotingStrategy};

use super::EngineArgs;
use crate::print_warning;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Parallel,
    Cascading,
}

impl From<ModeArg> for InvocationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Parallel => InvocationMode::Parallel,
            ModeArg::Cascading => InvocationMode::Cascading,
        }
    }
}

/// Arguments for the detect command
#[derive(Args)]
pub struct DetectArgs {
    /// Statement to judge
    pub text: String,

    /// Ground truth or source material to judge against
    #[arg(long)]
    pub context: Option<String>,

    /// majority, weighted[:T], unanimous, threshold[:F] or cascading
    #[arg(long)]
    pub strategy: Option<String>,

    /// Force parallel or cascading invocation
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Maximum total judge cost
    #[arg(long)]
    pub max_cost: Option<f64>,

    /// Minimum number of judges that should vote
    #[arg(long)]
    pub min_models: Option<usize>,

    /// End-to-end deadline in milliseconds
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Run the detect command
pub async fn run(args: DetectArgs) -> Result<()> {
    let engine = args.engine.build()?;

    let mut request = engine.request(&args.text);
    if let Some(context) = &args.context {
        request = request.with_context(context);
    }
    if let Some(raw) = &args.strategy {
        let strategy = VotingStrategy::parse(raw).with_context(|| format!("Bad --strategy {}", raw))?;
        request = request.with_strategy(strategy);
    }
    if let Some(mode) = args.mode {
        request = request.with_mode(mode.into());
    }

    let mut budget = request.budget().clone();
    if let Some(max_cost) = args.max_cost {
        budget = budget.with_max_cost(max_cost);
    }
    if let Some(min_models) = args.min_models {
        budget = budget.with_min_models(min_models);
    }
    if let Some(deadline) = args.deadline_ms {
        budget = budget.with_deadline(Duration::from_millis(deadline));
    }
    let request = request.with_budget(budget);
    tracing::debug!(id = %request.id(), mode = ?request.mode(), "Submitting detection request");

    let result = engine.detect(request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &ConsensusResult) {
    let verdict = if result.verdict {
        "HALLUCINATION".red().bold()
    } else {
        "NOT FLAGGED".green().bold()
    };
    println!("{} {}", "Verdict:".bold(), verdict);

    let score = result
        .aggregated_score
        .map(|s| format!("{:.3}", s))
        .unwrap_or_else(|| "n/a".to_string());
    println!("  {} {}", "Score:".dimmed(), score);
    println!(
        "  {} {}/{} ({:.0}%)",
        "Agreement:".dimmed(),
        result.models_agreed,
        result.models_voted,
        result.agreement_ratio * 100.0
    );
    println!("  {} {} / {}", "Strategy:".dimmed(), result.strategy, result.mode);
    println!(
        "  {} {} ({:.2})",
        "Difficulty:".dimmed(),
        result.difficulty_bucket,
        result.difficulty
    );
    println!(
        "  {} {:.4}  {} {}ms",
        "Cost:".dimmed(),
        result.total_cost,
        "Latency:".dimmed(),
        result.total_latency_ms
    );
    if result.from_cache {
        println!("  {} served from semantic cache", "ℹ".blue());
    }
    println!();

    if !result.judge_results.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Judge").fg(Color::Cyan),
                Cell::new("Score").fg(Color::Cyan),
                Cell::new("Confidence").fg(Color::Cyan),
                Cell::new("Latency").fg(Color::Cyan),
                Cell::new("Cost").fg(Color::Cyan),
                Cell::new("Status").fg(Color::Cyan),
            ]);
        for judge in &result.judge_results {
            let status = match &judge.error {
                None if judge.vote() => Cell::new("flagged").fg(Color::Red),
                None => Cell::new("clean").fg(Color::Green),
                Some(failure) => Cell::new(failure.to_string()).fg(Color::Yellow),
            };
            table.add_row(vec![
                Cell::new(judge.judge_id.as_str()),
                Cell::new(format!("{:.2}", judge.score)),
                Cell::new(format!("{:.2}", judge.confidence)),
                Cell::new(format!("{}ms", judge.latency_ms)),
                Cell::new(format!("{:.4}", judge.cost)),
                status,
            ]);
        }
        println!("{table}");
        println!();
    }

    for degradation in &result.degradations {
        print_warning(&degradation.to_string());
    }
    if result.low_confidence {
        print_warning("Low confidence result, consider human review");
    }
    println!("{}", result.explanation);
}
