//! Workflow executor: sequential, deterministic DAG execution.
//!
//! The executor walks a validated workflow in dependency order, resolves each
//! node's parameters against workflow parameters and upstream outputs, and
//! invokes the action contract. Business failures are recorded on the node
//! and propagate to dependents as skips; only contract violations and
//! cancellation abort a run.
//!
//! # Execution flow
//!
//! 1. Walk the executable nodes in topological order (ties by authoring order).
//! 2. Skip a node without calling it if any upstream did not succeed.
//! 3. Resolve parameters; a resolution error fails the node.
//! 4. Invoke the action; record outputs on success, the error on failure.
//! 5. Append every blocked node as a skipped step.

use flowforge_types::report::{ExecutionReport, StepStatus, TraceStep};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::action::{ActionCall, ActionInvoker, ActionOutcome, InvokeError};

use super::schema::ValidatedWorkflow;
use super::template::{ResolutionContext, resolve_parameter};

// ---------------------------------------------------------------------------
// ExecutorError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("action invoker failed on node '{node_id}': {source}")]
    Invoke {
        node_id: String,
        #[source]
        source: InvokeError,
    },

    #[error("execution cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Single-threaded, strictly ordered workflow executor.
#[derive(Debug, Clone, Default)]
pub struct WorkflowExecutor {
    cancel: Option<CancellationToken>,
}

impl WorkflowExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `token` before every action invocation.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Execute every node once and build the report.
    pub async fn execute<I: ActionInvoker>(
        &self,
        validated: &ValidatedWorkflow,
        invoker: &mut I,
    ) -> Result<ExecutionReport, ExecutorError> {
        let workflow = validated.workflow();
        let graph = validated.graph();
        let mut ctx = ResolutionContext::new(workflow.parameters.clone());
        let mut trace = Vec::with_capacity(workflow.nodes.len());

        tracing::info!(
            workflow_id = workflow.id.as_str(),
            nodes = workflow.nodes.len(),
            violations = graph.violations().len(),
            "starting workflow execution"
        );

        for &idx in graph.execution_order() {
            let node = &workflow.nodes[idx];

            let not_succeeded: Vec<&str> = graph
                .upstream(idx)
                .iter()
                .map(|&u| workflow.nodes[u].id.as_str())
                .filter(|id| ctx.status(id) != Some(StepStatus::Success))
                .collect();
            if !not_succeeded.is_empty() {
                tracing::debug!(node_id = node.id.as_str(), "skipping node after upstream failure");
                ctx.record_status(&node.id, StepStatus::Skipped);
                trace.push(TraceStep::skipped(
                    &node.id,
                    &node.service,
                    &node.action,
                    format!("skipped due to upstream failure: {}", not_succeeded.join(", ")),
                ));
                continue;
            }

            let mut parameters = Map::new();
            let mut resolution_error = None;
            for param in &node.parameters {
                match resolve_parameter(param, &ctx) {
                    Ok(value) => {
                        parameters.insert(param.name.clone(), value);
                    }
                    Err(e) => {
                        resolution_error = Some(format!("parameter '{}': {e}", param.name));
                        break;
                    }
                }
            }

            let step = |status, result, error| TraceStep {
                node_id: node.id.clone(),
                service: node.service.clone(),
                action: node.action.clone(),
                parameters: parameters.clone(),
                result,
                status,
                error,
            };

            if let Some(error) = resolution_error {
                tracing::debug!(node_id = node.id.as_str(), error = error.as_str(), "parameter resolution failed");
                ctx.record_status(&node.id, StepStatus::Failed);
                trace.push(step(StepStatus::Failed, None, Some(error)));
                continue;
            }

            if self.is_cancelled() {
                tracing::info!(workflow_id = workflow.id.as_str(), "workflow execution cancelled");
                return Err(ExecutorError::Cancelled);
            }

            let call = ActionCall {
                node_id: node.id.clone(),
                capability: validated.capability(idx),
                parameters: parameters.clone(),
            };
            let outcome = invoker
                .invoke(&call)
                .await
                .map_err(|source| ExecutorError::Invoke {
                    node_id: node.id.clone(),
                    source,
                })?;

            match outcome {
                ActionOutcome::Success { outputs } => {
                    tracing::debug!(node_id = node.id.as_str(), capability = %call.capability, "node succeeded");
                    trace.push(step(
                        StepStatus::Success,
                        Some(Value::Object(outputs.clone())),
                        None,
                    ));
                    ctx.record_success(&node.id, outputs);
                }
                ActionOutcome::Failure { error } => {
                    tracing::debug!(node_id = node.id.as_str(), error = error.as_str(), "node failed");
                    ctx.record_status(&node.id, StepStatus::Failed);
                    trace.push(step(StepStatus::Failed, None, Some(error)));
                }
            }
        }

        for (idx, reason) in graph.blocked() {
            let node = &workflow.nodes[*idx];
            trace.push(TraceStep::skipped(
                &node.id,
                &node.service,
                &node.action,
                reason.to_string(),
            ));
        }

        let report = ExecutionReport::build(workflow, trace, graph.violations().to_vec());
        tracing::info!(
            workflow_id = workflow.id.as_str(),
            successful = report.successful,
            failed = report.failed,
            skipped = report.skipped,
            "workflow execution finished"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
