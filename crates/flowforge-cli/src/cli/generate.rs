//! `flowforge generate`: run the self-correcting pipeline for one request.
//!
//! Events from the pipeline's bus are rendered on a separate task while the
//! run progresses. Ctrl-C cancels the run through its cancellation token.

use anyhow::{Context, Result};
use console::style;
use flowforge_core::event::EventBus;
use flowforge_core::generator::{GenerationRequest, WorkflowGenerator};
use flowforge_core::repository::WorkflowRepository;
use flowforge_core::workflow::pipeline::{PipelineError, SelfCorrectingPipeline};
use flowforge_infra::filesystem::FileWorkflowRepository;
use flowforge_infra::llm::{API_KEY_ENV, AnthropicGenerator, api_key_from_env};
use flowforge_infra::simulator::SimulatorProvider;
use flowforge_observe::attrs;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::render::{EventRenderer, print_report};
use super::{GenerateArgs, Output};
use crate::state::AppState;

pub async fn generate(state: &AppState, args: GenerateArgs, team: &str, out: Output) -> Result<()> {
    let api_key = api_key_from_env().with_context(|| format!("{API_KEY_ENV} is not set"))?;
    let generator = AnthropicGenerator::new(api_key, state.config.generator.clone())?;

    let mut request = GenerationRequest::new(args.request, team);
    request.context = args.context;
    if let Some(id) = &args.modify {
        let existing = state
            .repo
            .load(team, id)
            .await?
            .with_context(|| format!("workflow '{id}' not found in team '{team}'"))?;
        request.existing = Some(existing);
    }

    let max_fix_attempts = args
        .max_fix_attempts
        .unwrap_or(state.config.max_fix_attempts);
    let repository: Option<FileWorkflowRepository> = (!args.no_save).then(|| state.repo.clone());

    let span = tracing::info_span!(
        attrs::SPAN_GENERATE,
        { attrs::WORKFLOW_TEAM } = team,
        { attrs::GEN_AI_PROVIDER_NAME } = generator.name(),
        { attrs::GEN_AI_REQUEST_MODEL } = generator.model(),
    );

    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let pipeline = SelfCorrectingPipeline::new(
        generator,
        SimulatorProvider::new(state.config.simulator.clone()),
        repository,
        bus,
    )
    .with_max_fix_attempts(max_fix_attempts);

    let renderer = tokio::spawn(async move {
        let mut renderer = EventRenderer::new(out);
        loop {
            match events.recv().await {
                Ok(event) => renderer.handle(&event),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event renderer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
        renderer.finish();
    });

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let result = pipeline.run(request, cancel).instrument(span).await;
    // Dropping the pipeline closes the bus so the renderer drains and exits.
    drop(pipeline);
    renderer.await.context("event renderer panicked")?;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(PipelineError::Exhausted {
            attempts,
            diagnostic,
        }) => {
            if out.human() {
                println!();
                println!(
                    "  {} No clean workflow after {attempts} attempts. Last problem:",
                    style("✗").red().bold()
                );
                for line in diagnostic.feedback().lines() {
                    println!("    {line}");
                }
                println!();
            }
            anyhow::bail!("self-correction exhausted after {attempts} attempts");
        }
        Err(e) => return Err(e.into()),
    };

    if out.json {
        let doc = json!({
            "kind": "outcome",
            "payload": {
                "run_id": outcome.run_id,
                "attempts": outcome.attempts,
                "saved_version": outcome.saved_version,
                "workflow": outcome.workflow,
            }
        });
        println!("{}", serde_json::to_string(&doc)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    print_report(&outcome.report);
    println!(
        "  {} '{}' accepted after {} attempt(s)",
        style("✓").green().bold(),
        style(&outcome.workflow.id).cyan(),
        outcome.attempts
    );
    match outcome.saved_version {
        Some(version) => println!(
            "  Stored as v{version} under {}",
            style(
                state
                    .data_dir
                    .join("workflows")
                    .join(&outcome.workflow.team)
                    .display()
            )
            .dim()
        ),
        None => println!("  Not stored (--no-save)."),
    }
    println!();
    Ok(())
}
