//! Stats command - run a demo workload and show what the engine learned
//!
//! Usage:
//! ```bash
//! veritas stats --requests 50
//! veritas stats --prometheus
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use veritas_core::{DetectionRequest, DifficultyBucket};

use super::EngineArgs;
use crate::print_info;

/// Statements mixing plain, factual, hedged and technical text
const WORKLOAD: &[(&str, Option<&str>)] = &[
    ("The Eiffel Tower is in London.", Some("The Eiffel Tower is in Paris.")),
    ("Water boils at 100 degrees Celsius at sea level.", None),
    ("I think the meeting might be on Tuesday, but I'm not sure.", None),
    ("Every study ever published proves coffee causes 90% of heart disease.", None),
    ("Apollo 11 landed on the Moon on July 20, 1969.", Some("Apollo 11 landed on July 20, 1969.")),
    ("The compiler rewrites the kernel API using a quantum algorithm in 2031.", None),
    ("Hello, how are you today?", None),
    ("Revenue grew 340% in Q3 according to Acme Corp filings.", Some("Acme Corp revenue grew 12% in Q3.")),
];

/// Arguments for the stats command
#[derive(Args)]
pub struct StatsArgs {
    /// Number of detections to run
    #[arg(long, default_value_t = 24)]
    pub requests: usize,

    /// Print the counters in Prometheus text format instead of tables
    #[arg(long)]
    pub prometheus: bool,

    /// Print per-judge statistics as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Run the stats command
pub async fn run(args: StatsArgs) -> Result<()> {
    let engine = args.engine.build()?;

    for i in 0..args.requests {
        let (content, context) = WORKLOAD[i % WORKLOAD.len()];
        let mut request: DetectionRequest = engine.request(content);
        if let Some(context) = context {
            request = request.with_context(context);
        }
        engine.detect(request).await?;
    }
    engine.flush_stats().await;

    let stats = engine.performance_stats();
    let snapshot = engine.metrics().snapshot();

    if args.prometheus {
        print!("{}", snapshot.to_prometheus());
        return Ok(());
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "Judge performance".bold().cyan());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Judge").fg(Color::Cyan),
            Cell::new("Calls").fg(Color::Cyan),
            Cell::new("Success").fg(Color::Cyan),
            Cell::new("Confidence").fg(Color::Cyan),
            Cell::new("Latency").fg(Color::Cyan),
            Cell::new("Cost").fg(Color::Cyan),
            Cell::new("Low/Med/High").fg(Color::Cyan),
        ]);
    for stat in &stats {
        let per_bucket = [DifficultyBucket::Low, DifficultyBucket::Medium, DifficultyBucket::High]
            .iter()
            .map(|b| stat.bucket(*b).calls.to_string())
            .collect::<Vec<_>>()
            .join("/");
        let success = stat.success_rate();
        let success_color = if success >= 0.9 {
            Color::Green
        } else if success >= 0.6 {
            Color::Yellow
        } else {
            Color::Red
        };
        table.add_row(vec![
            Cell::new(stat.judge_id.as_str()).fg(Color::Green),
            Cell::new(stat.calls),
            Cell::new(format!("{:.1}%", success * 100.0)).fg(success_color),
            Cell::new(format!("{:.2}", stat.mean_confidence())),
            Cell::new(format!("{:.0}ms", stat.mean_latency_ms())),
            Cell::new(format!("{:.4}", stat.mean_cost())),
            Cell::new(per_bucket),
        ]);
    }
    println!("{table}");
    println!();

    println!("{}", "Engine".bold());
    println!("  {} {}", "Detections:".dimmed(), snapshot.detections);
    println!("  {} {}", "Flagged:".dimmed(), snapshot.flagged);
    println!(
        "  {} {} ({:.0}% hit rate)",
        "Cache hits:".dimmed(),
        snapshot.cache_hits,
        snapshot.cache_hit_rate() * 100.0
    );
    println!("  {} {}", "Low confidence:".dimmed(), snapshot.low_confidence);
    println!("  {} {}", "Cascade early stops:".dimmed(), snapshot.cascade_early_stops);
    println!("  {} {:.4}", "Total cost:".dimmed(), snapshot.total_cost);
    println!("  {} {:.3}", "Exploration rate:".dimmed(), engine.exploration_rate());
    if let Some(cache) = engine.cache_stats() {
        println!(
            "  {} {} live of {}",
            "Cache entries:".dimmed(),
            cache.valid_entries,
            cache.total_entries
        );
    }
    println!();
    print_info("Repeated statements are answered from the semantic cache");

    Ok(())
}
