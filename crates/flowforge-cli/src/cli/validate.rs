//! `flowforge validate`: schema and catalog checks for a workflow file.

use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;
use flowforge_core::workflow::schema::{ValidatedWorkflow, parse_workflow, validate_workflow};
use serde_json::json;

use super::Output;
use super::render::print_warnings;

/// Read and validate a workflow file.
pub async fn load_workflow_file(path: &Path) -> Result<ValidatedWorkflow> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let workflow = parse_workflow(&text)?;
    Ok(validate_workflow(workflow)?)
}

pub async fn validate(path: &Path, out: Output) -> Result<()> {
    let validated = match load_workflow_file(path).await {
        Ok(v) => v,
        Err(e) => {
            if out.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({"valid": false, "error": e.to_string()}))?
                );
            }
            bail!("{} is not a valid workflow: {e:#}", path.display());
        }
    };

    let workflow = validated.workflow();
    let order: Vec<&str> = validated
        .graph()
        .execution_order()
        .iter()
        .map(|&i| workflow.nodes[i].id.as_str())
        .collect();

    if out.json {
        let doc = json!({
            "valid": true,
            "id": workflow.id,
            "team": workflow.team,
            "nodes": workflow.nodes.len(),
            "execution_order": order,
            "dependency_violations": validated.graph().violations(),
            "warnings": validated.warnings(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} '{}' is valid ({} nodes)",
        style("✓").green().bold(),
        style(&workflow.id).cyan(),
        workflow.nodes.len()
    );
    println!("  Order: {}", order.join(" → "));
    for v in validated.graph().violations() {
        println!("  {} {v}", style("✗").red().bold());
    }
    print_warnings(validated.warnings());
    println!();
    Ok(())
}
