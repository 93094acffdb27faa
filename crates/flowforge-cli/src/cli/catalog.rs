//! `flowforge catalog`: the services and actions workflows may use.

use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use flowforge_types::catalog::{Capability, ServiceKind};
use serde_json::json;

use super::Output;

fn selected(service: Option<&str>) -> Result<Vec<Capability>> {
    match service {
        None => Ok(Capability::ALL.to_vec()),
        Some(name) => {
            let kind = ServiceKind::parse(name).ok_or_else(|| {
                let known: Vec<&str> = ServiceKind::ALL.iter().map(|s| s.as_str()).collect();
                anyhow!("unknown service '{name}' (expected one of: {})", known.join(", "))
            })?;
            Ok(Capability::for_service(kind).collect())
        }
    }
}

pub fn catalog(service: Option<&str>, out: Output) -> Result<()> {
    let caps = selected(service)?;

    if out.json {
        let doc: Vec<_> = caps
            .iter()
            .map(|c| {
                json!({
                    "service": c.service().as_str(),
                    "action": c.action(),
                    "description": c.description(),
                    "parameters": c.parameters(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Service").fg(Color::Cyan),
            Cell::new("Action"),
            Cell::new("Parameters"),
            Cell::new("Description"),
        ]);
    for c in &caps {
        let params: Vec<String> = c
            .parameters()
            .iter()
            .map(|p| {
                if p.required {
                    p.name.to_string()
                } else {
                    format!("[{}]", p.name)
                }
            })
            .collect();
        table.add_row(vec![
            Cell::new(c.service().title()),
            Cell::new(c.action()),
            Cell::new(params.join(", ")),
            Cell::new(c.description()),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}
