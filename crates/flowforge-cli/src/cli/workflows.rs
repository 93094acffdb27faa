//! Stored workflow commands: list, show, delete.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use flowforge_core::repository::WorkflowRepository;
use flowforge_types::workflow::Workflow;

use super::Output;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

pub async fn list(state: &AppState, team: &str, out: Output) -> Result<()> {
    let summaries = state
        .repo
        .list(team)
        .await
        .with_context(|| format!("failed to list workflows for team '{team}'"))?;

    if out.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    if summaries.is_empty() {
        println!();
        println!("  No workflows stored for team '{team}'.");
        println!(
            "  Create one with: {}",
            style("flowforge generate \"<what it should do>\"").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Version"),
            Cell::new("Nodes"),
            Cell::new("Description"),
        ]);
    for s in &summaries {
        table.add_row(vec![
            Cell::new(&s.id),
            Cell::new(&s.name),
            Cell::new(s.version),
            Cell::new(s.node_count),
            Cell::new(&s.description),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

pub async fn show(
    state: &AppState,
    team: &str,
    id: &str,
    version: Option<u32>,
    out: Output,
) -> Result<()> {
    let workflow = match version {
        Some(v) => state.repo.load_version(team, id, v).await?,
        None => state.repo.load(team, id).await?,
    }
    .with_context(|| match version {
        Some(v) => format!("workflow '{id}' v{v} not found in team '{team}'"),
        None => format!("workflow '{id}' not found in team '{team}'"),
    })?;

    if out.json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }
    if !out.quiet {
        print_workflow(&workflow);
    }
    Ok(())
}

fn print_workflow(workflow: &Workflow) {
    println!();
    println!(
        "  {} {}",
        style(&workflow.name).cyan().bold(),
        style(format!("v{}", workflow.version)).dim()
    );
    println!("  {}  {}", style("ID:").bold(), workflow.id);
    println!("  {}  {}", style("Team:").bold(), workflow.team);
    if !workflow.description.is_empty() {
        println!("  {}  {}", style("Description:").bold(), workflow.description);
    }

    if !workflow.parameters.is_empty() {
        println!();
        println!("  {}", style("Parameters:").bold());
        for (name, value) in &workflow.parameters {
            let shown = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("    {name} = {shown}");
        }
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Action"),
            Cell::new("Actor"),
            Cell::new("Depends on"),
        ]);
    for node in &workflow.nodes {
        table.add_row(vec![
            Cell::new(&node.id),
            Cell::new(format!("{}.{}", node.service, node.action)),
            Cell::new(&node.actor),
            Cell::new(node.depends_on.join(", ")),
        ]);
    }
    println!();
    println!("{table}");
    println!();
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

pub async fn delete(state: &AppState, team: &str, id: &str, out: Output) -> Result<()> {
    let removed = state.repo.delete(team, id).await?;

    if out.json {
        let doc = serde_json::json!({"id": id, "team": team, "deleted": removed});
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }
    if removed {
        println!(
            "  {} Deleted workflow '{}' (all versions)",
            style("✓").green().bold(),
            style(id).cyan()
        );
    } else {
        println!("  Nothing to delete: '{id}' is not stored for team '{team}'.");
    }
    Ok(())
}
