//! `flowforge run`: execute a workflow file against the simulator.

use std::path::Path;

use anyhow::{Result, bail};
use flowforge_core::action::ActionProvider;
use flowforge_core::workflow::executor::WorkflowExecutor;
use flowforge_infra::simulator::SimulatorProvider;
use flowforge_observe::attrs;
use tracing::Instrument;

use super::Output;
use super::render::{print_report, print_warnings, report_json};
use super::validate::load_workflow_file;
use crate::state::AppState;

pub async fn run(state: &AppState, path: &Path, seed: Option<u64>, out: Output) -> Result<()> {
    let validated = load_workflow_file(path).await?;

    let mut simulator_config = state.config.simulator.clone();
    if seed.is_some() {
        simulator_config.seed = seed;
    }
    let provider = SimulatorProvider::new(simulator_config);
    let mut session = provider.open_session();

    let span = tracing::info_span!(
        attrs::SPAN_SIMULATE,
        { attrs::WORKFLOW_ID } = validated.workflow().id.as_str(),
        { attrs::WORKFLOW_TEAM } = validated.workflow().team.as_str(),
    );
    let report = WorkflowExecutor::new()
        .execute(&validated, &mut session)
        .instrument(span)
        .await?;

    if out.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else if !out.quiet {
        print_warnings(validated.warnings());
        print_report(&report);
    }

    if !report.is_clean() {
        bail!("workflow '{}' did not run clean", report.workflow_id);
    }
    Ok(())
}
