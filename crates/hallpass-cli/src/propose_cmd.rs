//! `hallpass propose`: ask the proposer for a plan and show it for review.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::PgPool;

use hallpass_core::proposer::{self, TextGenerator};

pub async fn run_propose(
    pool: &PgPool,
    generator: &dyn TextGenerator,
    schedule_id: i32,
    instructions: &str,
    timeout: Duration,
    output: Option<&Path>,
) -> Result<()> {
    println!(
        "Requesting a seating plan for schedule {schedule_id} from {} (timeout {}s)...",
        generator.name(),
        timeout.as_secs()
    );

    let review = proposer::propose_plan(pool, generator, schedule_id, instructions, timeout)
        .await
        .with_context(|| format!("no proposal for schedule {schedule_id}"))?;

    println!();
    println!("Reasoning:");
    for line in review.reasoning.lines() {
        println!("  {line}");
    }
    println!();
    println!("Plan ({} item(s)):", review.plan.len());
    for item in &review.plan {
        println!("  {item}");
    }
    println!();
    match (&review.validation.kind, &review.validation.error) {
        (_, None) => println!("Validation: ok"),
        (kind, Some(error)) => println!(
            "Validation: FAILED ({}): {error}",
            kind.unwrap_or("unknown")
        ),
    }

    if let Some(path) = output {
        let doc = json!({ "reasoning": review.reasoning, "plan": review.plan });
        let contents = serde_json::to_string_pretty(&doc).context("failed to serialize plan")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write plan to {}", path.display()))?;
        println!();
        println!(
            "Plan written to {}. Edit it if needed, then run `hallpass execute {schedule_id} {}`.",
            path.display(),
            path.display()
        );
    }

    Ok(())
}
