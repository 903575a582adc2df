//! The `cweave workflow` commands: config introspection.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use chainweave_core::definition::{list_workflows, parse_config_yaml};

/// List all workflows in the config with their shapes.
pub fn list(config_path: &str, json: bool) -> Result<()> {
    let yaml = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config file '{config_path}'"))?;
    let config = parse_config_yaml(&yaml)?;

    let workflows = list_workflows(&config);

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!(
            "  {} No workflows defined in '{}'",
            style("i").blue().bold(),
            config_path
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Workflow").fg(Color::White),
        Cell::new("Steps").fg(Color::White),
        Cell::new("Parameters").fg(Color::White),
    ]);

    for info in &workflows {
        let steps = format!("{} ({})", info.step_count, info.step_names.join(" → "));
        let params = info
            .params
            .iter()
            .map(|p| {
                if p.required {
                    p.name.clone()
                } else {
                    format!("[{}]", p.name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        table.add_row(vec![
            Cell::new(&info.name).fg(Color::Cyan),
            Cell::new(steps),
            Cell::new(if params.is_empty() {
                "-".to_string()
            } else {
                params
            }),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} workflow{} (optional parameters in brackets)",
        style(workflows.len()).bold(),
        if workflows.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
