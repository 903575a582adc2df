//! The `cweave memory` commands: history, summary, stats, cleanup.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use chainweave_core::memory::{MemoryManager, MemoryStore};
use chainweave_types::memory::Classification;

use crate::state::AppState;

/// Show the full slice history of a run, oldest first.
pub async fn history(state: &AppState, run_id: &str, json: bool) -> Result<()> {
    let slices = state.store.history(run_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&slices)?);
        return Ok(());
    }

    if slices.is_empty() {
        println!();
        println!(
            "  {} No entries found for run '{}'",
            style("i").blue().bold(),
            run_id
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Step").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Content").fg(Color::White),
        Cell::new("At").fg(Color::White),
    ]);

    for slice in &slices {
        table.add_row(vec![
            Cell::new(slice.id).fg(Color::DarkGrey),
            Cell::new(&slice.step_name).fg(Color::Cyan),
            classification_cell(slice.classification),
            Cell::new(truncate(&slice.content, 60)),
            Cell::new(slice.created_at.format("%Y-%m-%d %H:%M").to_string())
                .fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} entr{} for run {}",
        style(slices.len()).bold(),
        if slices.len() == 1 { "y" } else { "ies" },
        style(run_id).cyan()
    );
    println!();

    Ok(())
}

/// Show a condensed summary of a run.
pub async fn summary(state: &AppState, run_id: &str, json: bool) -> Result<()> {
    let manager = MemoryManager::new(state.store.clone());
    let summary = manager.run_summary(run_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Run:").bold(), style(run_id).cyan());
    println!("  {} {}", style("Entries:").bold(), summary.entry_count);
    if !summary.step_names.is_empty() {
        println!(
            "  {} {}",
            style("Steps:").bold(),
            summary.step_names.join(" → ")
        );
    }
    for (classification, count) in &summary.by_classification {
        println!("    {classification}: {count}");
    }
    if let Some(started) = summary.started_at {
        println!(
            "  {} {}",
            style("Started:").bold(),
            started.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    if let Some(last) = summary.last_activity_at {
        println!(
            "  {} {}",
            style("Last activity:").bold(),
            last.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!(
        "  {} {}",
        style("User prompt:").bold(),
        if summary.has_user_prompt { "yes" } else { "no" }
    );
    println!();

    Ok(())
}

/// Show store-wide statistics.
pub async fn stats(state: &AppState, json: bool) -> Result<()> {
    let stats = state.store.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Total entries:").bold(), stats.total_entries);
    println!("  {} {}", style("Distinct runs:").bold(), stats.distinct_runs);
    if !stats.by_classification.is_empty() {
        println!("  {}", style("By classification:").bold());
        for (classification, count) in &stats.by_classification {
            println!("    {classification}: {count}");
        }
    }
    println!();

    Ok(())
}

/// Delete slices older than the retention window, with confirmation.
pub async fn cleanup(state: &AppState, days: u32, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete all memory entries older than {} day{}?",
                style(days).red().bold(),
                if days == 1 { "" } else { "s" }
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.red} {msg}")
            .unwrap(),
    );
    spinner.set_message("Cleaning up...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let deleted = state.store.cleanup(days).await?;

    spinner.finish_and_clear();

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "days": days }));
    } else {
        println!(
            "  {} Deleted {} entr{}.",
            style("✓").green().bold(),
            deleted,
            if deleted == 1 { "y" } else { "ies" }
        );
    }

    Ok(())
}

// --- Formatting helpers ---

fn classification_cell(classification: Classification) -> Cell {
    match classification {
        Classification::UserPrompt => Cell::new("user_prompt").fg(Color::Yellow),
        Classification::Parameters => Cell::new("parameters").fg(Color::Blue),
        Classification::Input => Cell::new("input").fg(Color::Magenta),
        Classification::Output => Cell::new("output").fg(Color::Green),
        Classification::Error => Cell::new("error").fg(Color::Red),
    }
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    } else {
        flat
    }
}
